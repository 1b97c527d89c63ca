//! Board-geometry input fields and live-view scaling
//!
//! The text fields echo exactly what the validators return, so the user can
//! never leave a field holding characters the board spec cannot parse.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum characters in the columns/rows fields
pub const COUNT_MAX_LEN: usize = 2;
/// Maximum characters in the square-size field
pub const SQUARE_SIZE_MAX_LEN: usize = 7;

/// Result of validating one edit of a numeric field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEdit<T> {
    /// Text the field should display after the edit
    pub text: String,
    /// New value for the board spec, if the edit produced one
    pub value: Option<T>,
}

/// Validate an edit of the columns or rows field.
///
/// Digits only, at most two of them. Over-long input is truncated; any other
/// character reverts the field to `current`.
pub fn edit_corner_count(input: &str, current: u32) -> FieldEdit<u32> {
    let text: String = input.chars().take(COUNT_MAX_LEN).collect();

    if !text.chars().all(|c| c.is_ascii_digit()) {
        return FieldEdit {
            text: current.to_string(),
            value: None,
        };
    }

    let value = text.parse::<u32>().ok().filter(|&v| v > 0);
    FieldEdit { text, value }
}

/// Validate an edit of the square-size field.
///
/// Digits with at most one decimal point, at most seven characters. A value
/// is produced once there is at least one digit before the point.
pub fn edit_square_size(input: &str, current: f32) -> FieldEdit<f32> {
    let text: String = input.chars().take(SQUARE_SIZE_MAX_LEN).collect();

    let dots = text.chars().filter(|&c| c == '.').count();
    let valid = dots <= 1 && text.chars().all(|c| c.is_ascii_digit() || c == '.');
    if !valid {
        return FieldEdit {
            text: current.to_string(),
            value: None,
        };
    }

    let value = if text.starts_with(|c: char| c.is_ascii_digit()) {
        text.trim_end_matches('.')
            .parse::<f32>()
            .ok()
            .filter(|v| *v > 0.0)
    } else {
        None
    };
    FieldEdit { text, value }
}

/// Scaling applied to the live camera frame before display
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayScale {
    /// Show frames at their native size
    Original,
    /// Fit frames inside a square of this many pixels, keeping aspect ratio
    Fit(u32),
}

impl DisplayScale {
    pub const ALL: [DisplayScale; 5] = [
        DisplayScale::Original,
        DisplayScale::Fit(360),
        DisplayScale::Fit(480),
        DisplayScale::Fit(720),
        DisplayScale::Fit(1080),
    ];
}

impl fmt::Display for DisplayScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayScale::Original => f.write_str("Original size"),
            DisplayScale::Fit(size) => write!(f, "Resize to {}", size),
        }
    }
}
