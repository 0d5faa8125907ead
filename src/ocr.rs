//! Letter classification: tile normalisation plus the feed-forward
//! network.
//!
//! The tile path is intentionally different from the page preprocessing:
//! one-hot quantise, invert so ink is 1, close(2), open(2), strip the
//! background margins, rescale to 28×28 and flatten. It matches what the
//! trained model was fed, bit for bit.

use std::path::Path;

use tracing::warn;

use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::network::Network;
use crate::preprocess::{morph, Morph};

/// Side of the normalised tile fed to the network.
pub const TILE_SIDE: usize = 28;

/// Structuring-element side for the tile close/open passes.
const TILE_MORPH_SIZE: usize = 2;

/// Wraps a trained [`Network`] whose geometry fits the letter task:
/// 784 inputs, 26 outputs.
pub struct Classifier {
    net: Network,
}

impl Classifier {
    pub fn new(net: Network) -> Result<Self> {
        let input = net.layer_height(0);
        let output = net.layer_height(net.layer_count() - 1);
        if input != TILE_SIDE * TILE_SIDE || output != 26 {
            return Err(Error::ModelLoad(format!(
                "letter model must map 784 inputs to 26 classes, got {input} to {output}"
            )));
        }
        Ok(Self { net })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Network::load(path)?)
    }

    /// Normalises a raw tile cropped from the binary page matrix into the
    /// 784×1 column the network expects.
    pub fn prepare_tile(tile: &Matrix) -> Result<Matrix> {
        let quantised = tile.one_hot();
        let inked = quantised.toggled();
        let closed = morph(&inked, TILE_MORPH_SIZE, Morph::Closing)?;
        let opened = morph(&closed, TILE_MORPH_SIZE, Morph::Opening)?;
        let stripped = opened.strip_margins()?;
        let scaled = stripped.scale_to_square(TILE_SIDE, 0.0)?;
        Ok(scaled.flatten_vertical())
    }

    /// Classifies one tile. The only non-classification outcome is
    /// [`Error::EmptyAfterStrip`] for a blank tile.
    pub fn classify(&self, tile: &Matrix) -> Result<char> {
        let input = Self::prepare_tile(tile)?;
        self.net.decode_letter(&input)
    }

    /// Classification that degrades instead of failing: a blank tile
    /// becomes `'?'`.
    pub fn classify_lossy(&self, tile: &Matrix) -> char {
        match self.classify(tile) {
            Ok(letter) => letter,
            Err(Error::EmptyAfterStrip) => '?',
            Err(e) => {
                warn!("tile classification degraded to '?': {e}");
                '?'
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn biased_classifier(hot: usize) -> Classifier {
        let weights = vec![Matrix::zeros(26, 784).unwrap()];
        let mut bias = Matrix::zeros(26, 1).unwrap();
        bias.set(hot, 0, 5.0);
        let net = Network::from_parts(vec![784, 26], weights, vec![bias]).unwrap();
        Classifier::new(net).unwrap()
    }

    #[test]
    fn test_rejects_wrong_geometry() {
        let net = Network::from_parts(
            vec![10, 26],
            vec![Matrix::zeros(26, 10).unwrap()],
            vec![Matrix::zeros(26, 1).unwrap()],
        )
        .unwrap();
        assert!(matches!(Classifier::new(net), Err(Error::ModelLoad(_))));
    }

    #[test]
    fn test_prepare_tile_shape() {
        // A 40x40 tile with a fat ink blob in the middle.
        let mut tile = Matrix::filled(40, 40, 255.0).unwrap();
        for row in 10..30 {
            for col in 10..30 {
                tile.set(row, col, 0.0);
            }
        }
        let prepared = Classifier::prepare_tile(&tile).unwrap();
        assert_eq!(prepared.height(), 784);
        assert_eq!(prepared.width(), 1);
        // Ink is 1 after inversion, and the blob must survive the
        // morphology.
        assert!(prepared.sum() > 0.0);
    }

    #[test]
    fn test_blank_tile_is_empty_after_strip() {
        let tile = Matrix::filled(40, 40, 255.0).unwrap();
        assert!(matches!(
            Classifier::prepare_tile(&tile),
            Err(Error::EmptyAfterStrip)
        ));
    }

    /// Literal smoke test: an all-zero tile through a model whose only
    /// signal is bias 5 at index 3 must come out as 'd'.
    #[test]
    fn test_all_ink_tile_with_hot_bias_reads_d() {
        let classifier = biased_classifier(3);
        let tile = Matrix::zeros(TILE_SIDE, TILE_SIDE).unwrap();
        assert_eq!(classifier.classify(&tile).unwrap(), 'd');
    }

    #[test]
    fn test_classify_lossy_degrades_blank_to_question_mark() {
        let classifier = biased_classifier(0);
        let blank = Matrix::filled(30, 30, 255.0).unwrap();
        assert_eq!(classifier.classify_lossy(&blank), '?');
    }
}
