//! Bit-packed letter dataset used by the offline tooling.
//!
//! The file starts with a `u64` record count; each record is an `i8`
//! class index followed by 98 bytes holding the 784 pixels of a 28×28
//! tile as single bits, row-major, most significant bit first within
//! each byte.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::info;

use crate::error::{Error, Result};
use crate::matrix::Matrix;

const TILE_PIXELS: usize = 28 * 28;
const PACKED_BYTES: usize = TILE_PIXELS / 8;

/// One labelled training example.
pub struct Sample {
    /// Flattened 784×1 binary tile.
    pub input: Matrix,
    /// Class index, `0 ↦ 'a'`.
    pub label: u8,
}

impl Sample {
    pub fn new(input: Matrix, label: u8) -> Result<Self> {
        if input.height() != TILE_PIXELS || input.width() != 1 {
            return Err(Error::InvalidInput(format!(
                "sample input must be {TILE_PIXELS}x1, got {}x{}",
                input.height(),
                input.width()
            )));
        }
        if label >= 26 {
            return Err(Error::InvalidInput(format!(
                "class index {label} is outside the alphabet"
            )));
        }
        Ok(Self { input, label })
    }

    /// The letter this sample is labelled with.
    pub fn letter(&self) -> char {
        (b'a' + self.label) as char
    }

    /// 26×1 one-hot expectation column for the label.
    pub fn expected(&self) -> Matrix {
        let mut out = Matrix::zeros(26, 1).expect("fixed non-zero dims");
        out.set(self.label as usize, 0, 1.0);
        out
    }
}

/// Reads a packed dataset file.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<Sample>> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);

    let size = reader
        .read_u64::<LittleEndian>()
        .map_err(|e| Error::InvalidInput(format!("truncated dataset size: {e}")))?
        as usize;

    let mut samples = Vec::with_capacity(size);
    let mut packed = [0u8; PACKED_BYTES];
    for record in 0..size {
        let label = reader
            .read_i8()
            .map_err(|e| Error::InvalidInput(format!("truncated class of record {record}: {e}")))?;
        reader
            .read_exact(&mut packed)
            .map_err(|e| Error::InvalidInput(format!("truncated pixels of record {record}: {e}")))?;

        let mut content = vec![0.0f32; TILE_PIXELS];
        for (i, value) in content.iter_mut().enumerate() {
            let byte = packed[i / 8];
            let bit = 7 - (i % 8);
            if byte & (1 << bit) != 0 {
                *value = 1.0;
            }
        }
        samples.push(Sample::new(
            Matrix::from_vec(TILE_PIXELS, 1, content)?,
            label as u8,
        )?);
    }

    info!(records = samples.len(), "loaded dataset from {}", path.display());
    Ok(samples)
}

/// Writes samples in the packed layout [`load`] reads.
pub fn save(samples: &[Sample], path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_u64::<LittleEndian>(samples.len() as u64)?;

    for sample in samples {
        writer.write_i8(sample.label as i8)?;
        let pixels = sample.input.as_slice();
        for chunk in pixels.chunks(8) {
            let mut byte = 0u8;
            for (bit, &pixel) in chunk.iter().enumerate() {
                if pixel != 0.0 {
                    byte |= 1 << (7 - bit);
                }
            }
            writer.write_u8(byte)?;
        }
    }
    writer.flush()?;
    Ok(())
}
