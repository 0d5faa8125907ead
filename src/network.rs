//! Fully connected feed-forward network and its binary model format.
//!
//! The model file is little-endian: a `u64` layer count, the layer
//! heights as `u64` each, then one `(height: u64, width: u64, f32
//! row-major payload)` block per non-input weight matrix, then the same
//! for the bias columns. The element type is `f32` end to end.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::info;

use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// Feed-forward network: `weights[i]` and `biases[i]` connect layer `i`
/// to layer `i + 1`.
pub struct Network {
    layer_heights: Vec<usize>,
    weights: Vec<Matrix>,
    biases: Vec<Matrix>,
}

impl Network {
    /// Builds a network from explicit weight and bias matrices,
    /// validating the geometry against `layer_heights`.
    pub fn from_parts(
        layer_heights: Vec<usize>,
        weights: Vec<Matrix>,
        biases: Vec<Matrix>,
    ) -> Result<Self> {
        if layer_heights.len() < 2 {
            return Err(Error::ModelLoad(format!(
                "a network needs at least two layers, got {}",
                layer_heights.len()
            )));
        }
        let transitions = layer_heights.len() - 1;
        if weights.len() != transitions || biases.len() != transitions {
            return Err(Error::ModelLoad(format!(
                "expected {transitions} weight and bias matrices, got {} and {}",
                weights.len(),
                biases.len()
            )));
        }
        for i in 0..transitions {
            let (out_h, in_h) = (layer_heights[i + 1], layer_heights[i]);
            if weights[i].height() != out_h || weights[i].width() != in_h {
                return Err(Error::ModelLoad(format!(
                    "weight matrix {} is {}x{}, expected {out_h}x{in_h}",
                    i + 1,
                    weights[i].height(),
                    weights[i].width()
                )));
            }
            if biases[i].height() != out_h || biases[i].width() != 1 {
                return Err(Error::ModelLoad(format!(
                    "bias column {} is {}x{}, expected {out_h}x1",
                    i + 1,
                    biases[i].height(),
                    biases[i].width()
                )));
            }
        }
        Ok(Self {
            layer_heights,
            weights,
            biases,
        })
    }

    /// Fresh network with weights and biases drawn uniformly from
    /// `[-1, 1)`. Offline path only; inference loads a trained file.
    pub fn random(layer_heights: Vec<usize>) -> Result<Self> {
        if layer_heights.len() < 2 {
            return Err(Error::ModelLoad(format!(
                "a network needs at least two layers, got {}",
                layer_heights.len()
            )));
        }
        let mut weights = Vec::with_capacity(layer_heights.len() - 1);
        let mut biases = Vec::with_capacity(layer_heights.len() - 1);
        for pair in layer_heights.windows(2) {
            weights.push(Matrix::random(pair[1], pair[0], -1.0, 1.0)?);
            biases.push(Matrix::random(pair[1], 1, -1.0, 1.0)?);
        }
        Self::from_parts(layer_heights, weights, biases)
    }

    pub fn layer_count(&self) -> usize {
        self.layer_heights.len()
    }

    pub fn layer_height(&self, layer: usize) -> usize {
        self.layer_heights[layer]
    }

    fn read_matrix(reader: &mut impl Read, what: &str) -> Result<Matrix> {
        let height = reader
            .read_u64::<LittleEndian>()
            .map_err(|e| Error::ModelLoad(format!("truncated {what} height: {e}")))?
            as usize;
        let width = reader
            .read_u64::<LittleEndian>()
            .map_err(|e| Error::ModelLoad(format!("truncated {what} width: {e}")))?
            as usize;
        if height == 0 || width == 0 {
            return Err(Error::ModelLoad(format!("{what} has a zero dimension")));
        }
        let mut content = vec![0.0f32; height * width];
        reader
            .read_f32_into::<LittleEndian>(&mut content)
            .map_err(|e| Error::ModelLoad(format!("truncated {what} payload: {e}")))?;
        Matrix::from_vec(height, width, content)
    }

    /// Loads a trained model. Any truncation or geometry mismatch is a
    /// [`Error::ModelLoad`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);

        let layer_count = reader
            .read_u64::<LittleEndian>()
            .map_err(|e| Error::ModelLoad(format!("truncated layer count: {e}")))?
            as usize;
        if layer_count < 2 {
            return Err(Error::ModelLoad(format!(
                "a network needs at least two layers, file declares {layer_count}"
            )));
        }

        let mut layer_heights = Vec::with_capacity(layer_count);
        for i in 0..layer_count {
            let height = reader
                .read_u64::<LittleEndian>()
                .map_err(|e| Error::ModelLoad(format!("truncated height of layer {i}: {e}")))?;
            layer_heights.push(height as usize);
        }

        let mut weights = Vec::with_capacity(layer_count - 1);
        for i in 1..layer_count {
            weights.push(Self::read_matrix(&mut reader, &format!("weight {i}"))?);
        }
        let mut biases = Vec::with_capacity(layer_count - 1);
        for i in 1..layer_count {
            biases.push(Self::read_matrix(&mut reader, &format!("bias {i}"))?);
        }

        let net = Self::from_parts(layer_heights, weights, biases)?;
        info!(
            layers = ?net.layer_heights,
            "loaded model from {}",
            path.display()
        );
        Ok(net)
    }

    fn write_matrix(writer: &mut impl Write, matrix: &Matrix) -> Result<()> {
        writer.write_u64::<LittleEndian>(matrix.height() as u64)?;
        writer.write_u64::<LittleEndian>(matrix.width() as u64)?;
        for &value in matrix.as_slice() {
            writer.write_f32::<LittleEndian>(value)?;
        }
        Ok(())
    }

    /// Writes the model in the same binary layout [`Network::load`]
    /// reads.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_u64::<LittleEndian>(self.layer_heights.len() as u64)?;
        for &height in &self.layer_heights {
            writer.write_u64::<LittleEndian>(height as u64)?;
        }
        for weight in &self.weights {
            Self::write_matrix(&mut writer, weight)?;
        }
        for bias in &self.biases {
            Self::write_matrix(&mut writer, bias)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Forward pass: `aᵢ = σ(Wᵢ·aᵢ₋₁ + bᵢ)` for every non-input layer.
    /// The input must be a column of the input layer's height.
    pub fn feed_forward(&self, input: &Matrix) -> Result<Matrix> {
        if input.height() != self.layer_heights[0] || input.width() != 1 {
            return Err(Error::InvalidInput(format!(
                "network input must be {}x1, got {}x{}",
                self.layer_heights[0],
                input.height(),
                input.width()
            )));
        }

        let mut activation = input.clone();
        for (weight, bias) in self.weights.iter().zip(&self.biases) {
            let mut next = weight.matmul(&activation)?;
            next.add_assign(bias)?;
            next.map_mut(crate::matrix::sigmoid);
            activation = next;
        }
        Ok(activation)
    }

    /// Runs the forward pass and maps the argmax class to a lower-case
    /// letter, `0 ↦ 'a'`.
    pub fn decode_letter(&self, input: &Matrix) -> Result<char> {
        let output = self.feed_forward(input)?;
        let class = output.argmax_column(0);
        Ok((b'a' + class as u8) as char)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn biased_net(input: usize, classes: usize, hot: usize, value: f32) -> Network {
        let weights = vec![Matrix::zeros(classes, input).unwrap()];
        let mut bias = Matrix::zeros(classes, 1).unwrap();
        bias.set(hot, 0, value);
        Network::from_parts(vec![input, classes], weights, vec![bias]).unwrap()
    }

    #[test]
    fn test_from_parts_rejects_bad_geometry() {
        let weights = vec![Matrix::zeros(3, 5).unwrap()];
        let biases = vec![Matrix::zeros(3, 1).unwrap()];
        assert!(matches!(
            Network::from_parts(vec![4, 3], weights, biases),
            Err(Error::ModelLoad(_))
        ));
    }

    #[test]
    fn test_feed_forward_rejects_bad_input_shape() {
        let net = biased_net(4, 2, 0, 1.0);
        let wide = Matrix::zeros(4, 2).unwrap();
        assert!(net.feed_forward(&wide).is_err());
        let short = Matrix::zeros(3, 1).unwrap();
        assert!(net.feed_forward(&short).is_err());
    }

    /// Zero weights and a single hot bias: the output distribution is
    /// flat sigmoid(0) everywhere except the biased class.
    #[test]
    fn test_bias_selects_class() {
        let net = biased_net(784, 26, 3, 5.0);
        let input = Matrix::zeros(784, 1).unwrap();
        assert_eq!(net.decode_letter(&input).unwrap(), 'd');
    }

    #[test]
    fn test_weight_row_selects_class_from_pixel() {
        // Class k fires when pixel k is lit.
        let mut weight = Matrix::zeros(26, 784).unwrap();
        for k in 0..26 {
            weight.set(k, k, 10.0);
        }
        let net = Network::from_parts(
            vec![784, 26],
            vec![weight],
            vec![Matrix::zeros(26, 1).unwrap()],
        )
        .unwrap();

        let mut input = Matrix::zeros(784, 1).unwrap();
        input.set(7, 0, 1.0);
        assert_eq!(net.decode_letter(&input).unwrap(), 'h');
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.nn");

        let original = Network::random(vec![8, 5, 3]).unwrap();
        original.save(&path).unwrap();
        let loaded = Network::load(&path).unwrap();

        assert_eq!(loaded.layer_count(), 3);
        assert_eq!(loaded.layer_height(1), 5);
        let input = Matrix::filled(8, 1, 0.25).unwrap();
        assert_eq!(
            original.feed_forward(&input).unwrap(),
            loaded.feed_forward(&input).unwrap()
        );
    }

    #[test]
    fn test_load_rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.nn");

        let net = Network::random(vec![8, 3]).unwrap();
        net.save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 7]).unwrap();

        assert!(matches!(Network::load(&path), Err(Error::ModelLoad(_))));
    }
}
