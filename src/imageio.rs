//! Raster ingress and egress.
//!
//! Decoding accepts anything the `image` crate can parse (PNG and JPEG in
//! practice) and keeps only the first three channels. Encoding writes a
//! matrix back out as a grayscale PNG so intermediate stages can be
//! inspected.

use std::path::Path;

use image::{GrayImage, Luma, RgbImage};
use tracing::debug;

use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// Decodes the raster file at `path` into an owned RGB buffer.
pub fn load_image(path: impl AsRef<Path>) -> Result<RgbImage> {
    let path = path.as_ref();
    let img = image::open(path)
        .map_err(|e| Error::InvalidInput(format!("cannot decode {}: {e}", path.display())))?;
    let rgb = img.to_rgb8();
    debug!(
        width = rgb.width(),
        height = rgb.height(),
        "decoded {}",
        path.display()
    );
    Ok(rgb)
}

/// Converts a matrix of grayscale values into an 8-bit image.
///
/// Every coefficient must lie in `[0, 255]`; values are rounded to the
/// nearest integer.
pub fn matrix_to_gray(matrix: &Matrix) -> Result<GrayImage> {
    let (h, w) = (matrix.height(), matrix.width());
    let mut img = GrayImage::new(w as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            let v = matrix.at(row, col);
            if !(0.0..=255.0).contains(&v) {
                return Err(Error::InvalidInput(format!(
                    "matrix value {v} at ({row}, {col}) is outside [0, 255]"
                )));
            }
            img.put_pixel(col as u32, row as u32, Luma([v.round() as u8]));
        }
    }
    Ok(img)
}

/// Writes a matrix as a grayscale PNG.
pub fn save_matrix_png(matrix: &Matrix, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let img = matrix_to_gray(matrix)?;
    img.save(path)?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Copies a rectangular region of a matrix into a fresh matrix.
///
/// Corner order is normalised, so callers may pass any two opposite
/// corners. Coordinates are clamped to the matrix bounds.
pub fn crop_matrix(src: &Matrix, x0: i32, y0: i32, x1: i32, y1: i32) -> Result<Matrix> {
    let (x0, x1) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
    let (y0, y1) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };

    let x0 = x0.max(0) as usize;
    let y0 = y0.max(0) as usize;
    let x1 = (x1.max(0) as usize).min(src.width().saturating_sub(1));
    let y1 = (y1.max(0) as usize).min(src.height().saturating_sub(1));

    if x1 < x0 || y1 < y0 {
        return Err(Error::InvalidInput(format!(
            "region ({x0}, {y0})-({x1}, {y1}) lies outside the matrix"
        )));
    }

    let mut out = Matrix::zeros(y1 - y0 + 1, x1 - x0 + 1)?;
    for row in 0..out.height() {
        for col in 0..out.width() {
            out.set(row, col, src.at(y0 + row, x0 + col));
        }
    }
    Ok(out)
}
