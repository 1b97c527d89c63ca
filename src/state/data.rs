//! Shared data structures for the application state
//!
//! These structs represent the data model that flows between
//! the dataset, the background workers and the UI layer.

use cgmath::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chessboard detection status of one calibration image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionState {
    /// Not processed since the file joined the dataset
    #[default]
    Unknown,
    /// The last detection pass found the full corner grid
    Detected,
    /// The last detection pass found no board, or the file could not be read
    NotDetected,
}

impl DetectionState {
    pub fn from_found(found: bool) -> Self {
        if found {
            DetectionState::Detected
        } else {
            DetectionState::NotDetected
        }
    }
}

impl fmt::Display for DetectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DetectionState::Unknown => "",
            DetectionState::Detected => "found",
            DetectionState::NotDetected => "not found",
        };
        f.write_str(label)
    }
}

/// Represents a single image in the calibration dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationImageRecord {
    /// Filename only (e.g., "20240101_120000.jpg"), unique within the dataset
    pub filename: String,
    /// Outcome of the most recent detection pass on this file
    pub detection_state: DetectionState,
}

impl CalibrationImageRecord {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            detection_state: DetectionState::Unknown,
        }
    }
}

/// Expected board geometry
///
/// `columns` and `rows` count interior corners, not squares.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ChessboardSpec {
    pub columns: u32,
    pub rows: u32,
    pub square_size_mm: f32,
}

impl Default for ChessboardSpec {
    fn default() -> Self {
        Self {
            columns: 9,
            rows: 6,
            square_size_mm: 24.6,
        }
    }
}

impl ChessboardSpec {
    /// Pattern size handed to the corner finder
    pub fn pattern_size(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    pub fn corner_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Board-frame coordinates of every interior corner, in millimetres
    ///
    /// Row-major, matching the order the corner finder reports image points.
    /// The board lies in the z = 0 plane.
    pub fn object_points(&self) -> Vec<Point3<f32>> {
        let mut points = Vec::with_capacity(self.corner_count());
        for row in 0..self.rows {
            for col in 0..self.columns {
                points.push(Point3::new(
                    col as f32 * self.square_size_mm,
                    row as f32 * self.square_size_mm,
                    0.0,
                ));
            }
        }
        points
    }
}
