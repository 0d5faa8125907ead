//! Tunable parameters for the image-to-symbolic pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// All knobs of the pipeline, with the defaults the system ships with.
///
/// A JSON file with any subset of the fields can be layered on top of the
/// defaults via [`Config::from_json_file`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Background value written by the adaptive threshold (ink is 0).
    pub max_value: f32,
    /// Side of the Gaussian window used by the adaptive threshold. Odd.
    pub threshold_kernel: usize,
    /// Standard deviation of the Gaussian window.
    pub threshold_sigma: f32,
    /// Bias subtracted from the local mean before comparing.
    pub threshold_c: f32,
    /// Structuring-element side of the closing pass on the main path.
    pub closing_size: usize,
    /// Structuring-element side of the opening pass on the main path.
    pub opening_size: usize,
    /// Angular resolution of the Hough accumulator, in degrees.
    pub theta_step_deg: f32,
    /// Accumulator cells with at least `peak_ratio * max` votes become
    /// candidate lines.
    pub peak_ratio: f32,
    /// When set, the peak threshold becomes `mean + peak_sigma * stddev`
    /// over the accumulator instead of the ratio rule.
    pub peak_sigma: Option<f32>,
    /// Non-maximum suppression radius along r, in pixels.
    pub nms_delta_r: f32,
    /// Non-maximum suppression radius along theta, in degrees.
    pub nms_delta_theta: f32,
    /// Skew magnitudes below this are not worth a rotation, in degrees.
    pub skew_epsilon_deg: f32,
    /// Minimum ink pixels per row for that row to belong to a word.
    pub word_row_threshold: usize,
    /// Padding stripped from the word-list region on every side.
    pub region_padding: usize,
    /// Vertical margin added around each detected word box.
    pub word_margin: usize,
    /// Minimum ink pixels per column for that column to belong to a
    /// letter.
    pub letter_col_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_value: 255.0,
            threshold_kernel: 11,
            threshold_sigma: 7.0,
            threshold_c: 4.0,
            closing_size: 1,
            opening_size: 2,
            theta_step_deg: 1.0,
            peak_ratio: 0.7,
            peak_sigma: None,
            nms_delta_r: 5.0,
            nms_delta_theta: 1.0,
            skew_epsilon_deg: 0.5,
            word_row_threshold: 5,
            region_padding: 20,
            word_margin: 4,
            letter_col_threshold: 2,
        }
    }
}

impl Config {
    /// Loads overrides from a JSON file; missing fields keep their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidInput(format!("bad config {}: {e}", path.display())))
    }
}
