//! Skew estimation and rotation for camera-captured grids.
//!
//! The dominant line orientation is read off the Hough accumulator and
//! reduced modulo 90° into `(−45°, 45°]`; the negated result is the
//! rotation that re-aligns the grid with the axes. Rotation is a
//! backward mapping about the image centre so every destination pixel is
//! written exactly once.

use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::hough::Accumulator;
use crate::matrix::Matrix;

/// θ resolution used for skew estimation. One degree matches the
/// accumulator the line detector runs later.
const SKEW_THETA_STEP: f32 = 1.0;

/// Estimates the skew of a binary matrix, in degrees within
/// `(−45°, 45°]` negated, i.e. the angle to rotate by so the grid becomes
/// axis-aligned.
pub fn estimate_skew(src: &Matrix) -> Result<f32> {
    let acc = Accumulator::populate(src, SKEW_THETA_STEP)?;
    let peak = acc.peak_theta();

    // Both grid pencils are 90 degrees apart, so the peak is meaningful
    // only modulo 90.
    let mut skew = peak % 90.0;
    if skew > 45.0 {
        skew -= 90.0;
    }
    debug!(peak, skew, "estimated grid skew");
    Ok(-skew)
}

/// Rotates the matrix content by `angle` degrees about its centre.
///
/// The canvas grows to `⌈|w·cosθ|+|h·sinθ|⌉ × ⌈|h·cosθ|+|w·sinθ|⌉` and
/// destination pixels with no source are filled with `fill` so a binary
/// image keeps its background convention.
pub fn rotate(src: &Matrix, angle: f32, fill: f32) -> Result<Matrix> {
    let h = src.height();
    let w = src.width();
    let rad = angle.to_radians();
    let (sin, cos) = rad.sin_cos();

    let new_w = (w as f32 * cos).abs().ceil() + (h as f32 * sin).abs().ceil();
    let new_h = (h as f32 * cos).abs().ceil() + (w as f32 * sin).abs().ceil();
    let (new_w, new_h) = (new_w as usize, new_h as usize);

    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;
    let ncx = new_w as f32 / 2.0;
    let ncy = new_h as f32 / 2.0;

    let mut out = Matrix::filled(new_h, new_w, fill)?;
    for y in 0..new_h {
        for x in 0..new_w {
            // Backward map: the source location is the destination offset
            // rotated by −angle.
            let dx = x as f32 - ncx;
            let dy = y as f32 - ncy;
            let tx = dx * cos + dy * sin + cx;
            let ty = -dx * sin + dy * cos + cy;
            if tx >= 0.0 && tx < w as f32 && ty >= 0.0 && ty < h as f32 {
                out.set(y, x, src.at(ty as usize, tx as usize));
            }
        }
    }
    Ok(out)
}

/// Rotates `src` so its dominant grid lines land near 0° and 90°.
///
/// Skews below `cfg.skew_epsilon_deg` are not worth resampling; the
/// input is returned unchanged.
pub fn deskew(src: &Matrix, cfg: &Config) -> Result<Matrix> {
    let skew = estimate_skew(src)?;
    if skew.abs() < cfg.skew_epsilon_deg {
        debug!(skew, "skew below threshold, skipping rotation");
        return Ok(src.clone());
    }
    debug!(skew, "rotating to deskew");
    rotate(src, skew, cfg.max_value)
}
