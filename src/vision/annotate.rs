//! Corner marker overlay
//!
//! Draws each detected corner as a ring and joins consecutive corners with a
//! line, coloured per board row, so a correct detection shows as a zig-zag
//! running across the board.

use cgmath::Point2;
use image::{Rgb, RgbImage};

/// Ring radius in pixels
const MARKER_RADIUS: i32 = 5;

/// Row colours, cycled
const ROW_COLORS: [Rgb<u8>; 6] = [
    Rgb([255, 0, 0]),
    Rgb([255, 128, 0]),
    Rgb([200, 200, 0]),
    Rgb([0, 255, 0]),
    Rgb([0, 200, 255]),
    Rgb([255, 0, 255]),
];

/// Overlay markers for `corners` (row-major, `pattern.0` per row) on `image`
pub fn draw_corners(image: &mut RgbImage, pattern: (u32, u32), corners: &[Point2<f32>]) {
    let per_row = pattern.0.max(1) as usize;
    let mut previous: Option<(i32, i32)> = None;

    for (i, corner) in corners.iter().enumerate() {
        let color = ROW_COLORS[(i / per_row) % ROW_COLORS.len()];
        let point = (corner.x.round() as i32, corner.y.round() as i32);

        draw_ring(image, point, MARKER_RADIUS, color);
        if let Some(from) = previous {
            draw_line(image, from, point, color);
        }
        previous = Some(point);
    }
}

fn put(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenham line, clipped to the image
fn draw_line(image: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put(image, x, y, color);
        if (x, y) == to {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Midpoint circle outline, clipped to the image
fn draw_ring(image: &mut RgbImage, center: (i32, i32), radius: i32, color: Rgb<u8>) {
    let (cx, cy) = center;
    let mut x = radius;
    let mut y = 0;
    let mut err = 1 - radius;

    while x >= y {
        for (px, py) in [
            (x, y), (y, x), (-y, x), (-x, y),
            (-x, -y), (-y, -x), (y, -x), (x, -y),
        ] {
            put(image, cx + px, cy + py, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}
