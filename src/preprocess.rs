//! Preprocessing operators: grayscale conversion, adaptive Gaussian
//! thresholding and 1-D morphology.
//!
//! The output convention for binary matrices is inverted relative to the
//! usual morphology texts: ink is 0 and background is `max_value`, so
//! erosion takes the window maximum and dilation the minimum. The main
//! path produces a matrix that is 0 on ink, `max_value` elsewhere,
//! axis-aligned and mostly closed.

use image::RgbImage;
use rayon::prelude::*;
use tracing::debug;

use crate::config::Config;
use crate::deskew;
use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// Morphological transform selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Morph {
    Erosion,
    Dilation,
    Opening,
    Closing,
}

#[derive(Clone, Copy)]
enum Orientation {
    Horizontal,
    Vertical,
}

/// Rec.709 luminance of one pixel, rounded, in [0, 255].
fn pixel_to_grayscale(r: u8, g: u8, b: u8) -> f32 {
    let y = 0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32;
    y.round().clamp(0.0, 255.0)
}

/// Converts an RGB image to a grayscale matrix.
pub fn grayscale(img: &RgbImage) -> Result<Matrix> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut out = Matrix::zeros(h, w)?;
    for (x, y, pixel) in img.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        out.set(y as usize, x as usize, pixel_to_grayscale(r, g, b));
    }
    Ok(out)
}

#[inline]
fn clamp(value: isize, max: usize) -> usize {
    value.clamp(0, max as isize) as usize
}

/// Sampled 1-D Gaussian, normalised to unit sum.
pub fn gaussian_kernel_1d(sigma: f32, kernel_size: usize) -> Result<Vec<f32>> {
    if kernel_size % 2 == 0 {
        return Err(Error::InvalidInput(format!(
            "kernel size must be odd, got {kernel_size}"
        )));
    }
    if sigma <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "sigma must be positive, got {sigma}"
        )));
    }

    let m = (kernel_size / 2) as isize;
    let mut kernel = Vec::with_capacity(kernel_size);
    let mut sum = 0.0f32;
    for i in -m..=m {
        let value = (-(i * i) as f32 / (2.0 * sigma * sigma)).exp();
        kernel.push(value);
        sum += value;
    }
    for v in &mut kernel {
        *v /= sum;
    }
    Ok(kernel)
}

fn convolve_1d(src: &Matrix, kernel: &[f32], orientation: Orientation) -> Result<Matrix> {
    let m = (kernel.len() / 2) as isize;
    let height = src.height();
    let width = src.width();

    // Rows are independent, so they convolve in parallel; the output is
    // identical to the serial loop.
    let rows: Vec<Vec<f32>> = (0..height)
        .into_par_iter()
        .map(|row| {
            let mut out_row = vec![0.0f32; width];
            for (col, out) in out_row.iter_mut().enumerate() {
                let mut acc = 0.0f32;
                for (k, &weight) in kernel.iter().enumerate() {
                    let offset = k as isize - m;
                    // Out-of-bounds taps replicate the edge pixel.
                    let sample = match orientation {
                        Orientation::Horizontal => {
                            src.at(row, clamp(col as isize + offset, width - 1))
                        }
                        Orientation::Vertical => {
                            src.at(clamp(row as isize + offset, height - 1), col)
                        }
                    };
                    acc += weight * sample;
                }
                *out = acc;
            }
            out_row
        })
        .collect();

    Matrix::from_vec(height, width, rows.into_iter().flatten().collect())
}

/// Separable Gaussian blur with clamped edge replication.
pub fn gaussian_blur(src: &Matrix, sigma: f32, kernel_size: usize) -> Result<Matrix> {
    let kernel = gaussian_kernel_1d(sigma, kernel_size)?;
    let tmp = convolve_1d(src, &kernel, Orientation::Horizontal)?;
    convolve_1d(&tmp, &kernel, Orientation::Vertical)
}

/// Adaptive Gaussian threshold.
///
/// Each pixel is compared against its blurred neighbourhood minus the
/// bias `c`: above means background (`max_value`), at or below means ink
/// (0).
pub fn adaptive_threshold(
    src: &Matrix,
    max_value: f32,
    kernel_size: usize,
    sigma: f32,
    c: f32,
) -> Result<Matrix> {
    if max_value < 0.0 {
        return Err(Error::InvalidInput(format!(
            "max_value must be non-negative, got {max_value}"
        )));
    }

    let blurred = gaussian_blur(src, sigma, kernel_size)?;
    let mut out = Matrix::zeros(src.height(), src.width())?;
    for row in 0..src.height() {
        for col in 0..src.width() {
            let threshold = blurred.at(row, col) - c;
            if src.at(row, col) > threshold {
                out.set(row, col, max_value);
            }
        }
    }
    Ok(out)
}

fn morph_pass_1d(src: &Matrix, kernel_size: usize, op: Morph, orientation: Orientation) -> Result<Matrix> {
    if kernel_size == 0 {
        return Err(Error::InvalidInput(
            "morphology kernel size must be non-zero".into(),
        ));
    }

    // The anchor sits at kernel_size / 2, which also handles even
    // elements.
    let anchor = (kernel_size / 2) as isize;
    let span = kernel_size as isize;
    let height = src.height();
    let width = src.width();

    let rows: Vec<Vec<f32>> = (0..height)
        .into_par_iter()
        .map(|row| {
            let mut out_row = vec![0.0f32; width];
            for (col, out) in out_row.iter_mut().enumerate() {
                let mut extreme: Option<f32> = None;
                for offset in -anchor..(span - anchor) {
                    let sample = match orientation {
                        Orientation::Horizontal => {
                            src.at(row, clamp(col as isize + offset, width - 1))
                        }
                        Orientation::Vertical => {
                            src.at(clamp(row as isize + offset, height - 1), col)
                        }
                    };
                    // Background is max_value and ink 0, so erosion takes
                    // the maximum and dilation the minimum.
                    extreme = Some(match (op, extreme) {
                        (_, None) => sample,
                        (Morph::Erosion, Some(cur)) => cur.max(sample),
                        (Morph::Dilation, Some(cur)) => cur.min(sample),
                        _ => unreachable!("composite ops never reach the 1-D pass"),
                    });
                }
                *out = extreme.unwrap_or(0.0);
            }
            out_row
        })
        .collect();

    Matrix::from_vec(height, width, rows.into_iter().flatten().collect())
}

/// Erosion with a square structuring element of side `kernel_size`,
/// applied as two 1-D passes.
pub fn erode(src: &Matrix, kernel_size: usize) -> Result<Matrix> {
    let tmp = morph_pass_1d(src, kernel_size, Morph::Erosion, Orientation::Horizontal)?;
    morph_pass_1d(&tmp, kernel_size, Morph::Erosion, Orientation::Vertical)
}

/// Dilation with a square structuring element of side `kernel_size`.
pub fn dilate(src: &Matrix, kernel_size: usize) -> Result<Matrix> {
    let tmp = morph_pass_1d(src, kernel_size, Morph::Dilation, Orientation::Horizontal)?;
    morph_pass_1d(&tmp, kernel_size, Morph::Dilation, Orientation::Vertical)
}

/// Applies the selected morphological transform.
pub fn morph(src: &Matrix, kernel_size: usize, op: Morph) -> Result<Matrix> {
    match op {
        Morph::Erosion => erode(src, kernel_size),
        Morph::Dilation => dilate(src, kernel_size),
        Morph::Opening => {
            let eroded = erode(src, kernel_size)?;
            dilate(&eroded, kernel_size)
        }
        Morph::Closing => {
            let dilated = dilate(src, kernel_size)?;
            erode(&dilated, kernel_size)
        }
    }
}

/// Output of the main preprocessing path. Both matrices are 0 on ink and
/// `max_value` on background, axis-aligned.
pub struct Preprocessed {
    /// Thresholded and deskewed, before morphology. The opening pass can
    /// eat one-pixel ruling strokes, so line detection reads this one.
    pub aligned: Matrix,
    /// After the closing and opening passes; segmentation and tile
    /// extraction read this one.
    pub cleaned: Matrix,
}

/// Main preprocessing path: grayscale, adaptive threshold, deskew, then a
/// closing and an opening pass.
///
/// The single-letter path used by the classifier is different on
/// purpose; see the `ocr` module.
pub fn process(img: &RgbImage, cfg: &Config) -> Result<Preprocessed> {
    let gray = grayscale(img)?;
    let thresholded = adaptive_threshold(
        &gray,
        cfg.max_value,
        cfg.threshold_kernel,
        cfg.threshold_sigma,
        cfg.threshold_c,
    )?;
    drop(gray);

    let aligned = deskew::deskew(&thresholded, cfg)?;
    drop(thresholded);

    let closed = morph(&aligned, cfg.closing_size, Morph::Closing)?;
    let cleaned = morph(&closed, cfg.opening_size, Morph::Opening)?;
    debug!(
        height = cleaned.height(),
        width = cleaned.width(),
        "preprocessing finished"
    );
    Ok(Preprocessed { aligned, cleaned })
}
