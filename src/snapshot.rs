//! Frame snapshots as PNG images.
//!
//! Each LED becomes a `scale × scale` cell with a thin dark margin, so the
//! picture reads like the hat rather than a blurry 64×8 thumbnail.

use crate::Color;
use crate::geometry::{COLS, ROWS};
use crate::matrix::Matrix;
use image::{ImageFormat, Rgb, RgbImage};
use std::path::Path;

/// Render `matrix` into an image, `scale` pixels per LED.
pub fn render(matrix: &Matrix, scale: u32) -> RgbImage {
    let scale = scale.max(1);
    let margin = if scale >= 4 { (scale / 8).max(1) } else { 0 };

    RgbImage::from_fn(COLS as u32 * scale, ROWS as u32 * scale, |x, y| {
        let (col, row) = ((x / scale) as usize, (y / scale) as usize);
        let (cx, cy) = (x % scale, y % scale);
        let edge = cx < margin || cy < margin || cx >= scale - margin || cy >= scale - margin;

        let Color { r, g, b } = if edge { Color::OFF } else { matrix.get(row, col) };
        Rgb([r, g, b])
    })
}

/// Write `matrix` to `path` as a PNG.
pub fn save_png(
    matrix: &Matrix,
    path: &Path,
    scale: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    render(matrix, scale).save_with_format(path, ImageFormat::Png)?;
    tracing::info!("Wrote snapshot to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn one_pixel_per_led_at_scale_one() {
        let mut matrix = Matrix::new();
        matrix.set(0, 0, Color::new(255, 0, 0));
        matrix.set(7, 63, Color::new(0, 0, 255));

        let img = render(&matrix, 1);
        assert_eq!(img.dimensions(), (64, 8));
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(63, 7), &Rgb([0, 0, 255]));
        assert_eq!(img.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn scaled_cells_have_dark_margin() {
        let mut matrix = Matrix::new();
        matrix.fill(Color::new(10, 20, 30));

        let img = render(&matrix, 8);
        assert_eq!(img.dimensions(), (512, 64));
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(4, 4), &Rgb([10, 20, 30]));
        assert_eq!(img.get_pixel(7, 4), &Rgb([0, 0, 0]));
    }

    #[test]
    fn save_png_round_trips_through_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("frame.png");
        let mut matrix = Matrix::new();
        matrix.set(3, 10, Color::new(0, 200, 0));

        save_png(&matrix, &path, 2).unwrap();

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (128, 16));
        assert_eq!(loaded.get_pixel(20, 6), &Rgb([0, 200, 0]));
    }
}
