use image::{imageops, imageops::FilterType, RgbImage};

use crate::state::input::DisplayScale;

/// Resize `image` to fit inside `size` (width, height), keeping aspect ratio
pub fn make_thumbnail(image: &RgbImage, size: (u32, u32)) -> RgbImage {
    let (w, h) = fit_within(image.width(), image.height(), size);
    imageops::resize(image, w, h, FilterType::Triangle)
}

/// Dimensions of `(width, height)` scaled to fit inside `bound`, never zero
pub fn fit_within(width: u32, height: u32, bound: (u32, u32)) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }

    let ratio = f64::min(
        bound.0 as f64 / width as f64,
        bound.1 as f64 / height as f64,
    );
    let w = ((width as f64 * ratio).round() as u32).max(1);
    let h = ((height as f64 * ratio).round() as u32).max(1);
    (w, h)
}

/// Scale a live frame for display
pub fn scale_for_display(image: &RgbImage, scale: DisplayScale) -> RgbImage {
    match scale {
        DisplayScale::Original => image.clone(),
        DisplayScale::Fit(size) => {
            let (w, h) = fit_within(image.width(), image.height(), (size, size));
            if (w, h) == image.dimensions() {
                image.clone()
            } else {
                imageops::resize(image, w, h, FilterType::Triangle)
            }
        }
    }
}
