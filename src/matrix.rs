//! Dense 2-D `f32` buffer shared by every pipeline stage.
//!
//! The element type is a hard contract: the model file stores 32-bit
//! floats, and every operator from thresholding to the forward pass runs
//! on the same representation. Each operation that produces a new matrix
//! returns a freshly owned buffer; nothing aliases across stage
//! boundaries.

use ndarray::Array2;
use rand::Rng;

use crate::error::{Error, Result};

/// Logistic sigmoid.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Derivative of the logistic sigmoid, `σ(x)·(1−σ(x))`.
pub fn sigmoid_derivative(x: f32) -> f32 {
    let s = sigmoid(x);
    s * (1.0 - s)
}

/// Row-major `height × width` matrix of `f32`. Both dimensions are
/// non-zero by construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    data: Array2<f32>,
}

fn check_dims(height: usize, width: usize) -> Result<()> {
    if height == 0 {
        return Err(Error::InvalidInput(
            "matrix height must be non-zero".into(),
        ));
    }
    if width == 0 {
        return Err(Error::InvalidInput("matrix width must be non-zero".into()));
    }
    // Addressability guard: the product must fit an isize like any Rust
    // allocation.
    let cells = height
        .checked_mul(width)
        .filter(|&n| n <= isize::MAX as usize / std::mem::size_of::<f32>());
    if cells.is_none() {
        return Err(Error::ResourceExhaustion(format!(
            "{height}x{width} matrix exceeds addressable memory"
        )));
    }
    Ok(())
}

impl Matrix {
    /// Zero-filled matrix.
    pub fn zeros(height: usize, width: usize) -> Result<Self> {
        check_dims(height, width)?;
        Ok(Self {
            data: Array2::zeros((height, width)),
        })
    }

    /// Matrix with every coefficient set to `value`.
    pub fn filled(height: usize, width: usize, value: f32) -> Result<Self> {
        check_dims(height, width)?;
        Ok(Self {
            data: Array2::from_elem((height, width), value),
        })
    }

    /// Takes ownership of a row-major buffer.
    pub fn from_vec(height: usize, width: usize, content: Vec<f32>) -> Result<Self> {
        check_dims(height, width)?;
        if content.len() != height * width {
            return Err(Error::InvalidInput(format!(
                "buffer of {} elements cannot fill a {height}x{width} matrix",
                content.len()
            )));
        }
        let data = Array2::from_shape_vec((height, width), content)
            .expect("length checked above");
        Ok(Self { data })
    }

    /// Matrix with coefficients drawn uniformly from the half-open range
    /// `[low, high)`. Only used on the offline path.
    pub fn random(height: usize, width: usize, low: f32, high: f32) -> Result<Self> {
        check_dims(height, width)?;
        if low >= high {
            return Err(Error::InvalidInput(format!(
                "empty random range [{low}, {high})"
            )));
        }
        let mut rng = rand::rng();
        Ok(Self {
            data: Array2::from_shape_fn((height, width), |_| rng.random_range(low..high)),
        })
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    /// Bounds-checked element read. Panics on an out-of-range index.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.data[[row, col]]
    }

    /// Bounds-checked element write.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[[row, col]] = value;
    }

    /// Unchecked element read.
    ///
    /// # Safety
    /// `row < height()` and `col < width()` must hold.
    #[inline]
    pub unsafe fn at_unchecked(&self, row: usize, col: usize) -> f32 {
        *self.data.uget([row, col])
    }

    /// Unchecked element write.
    ///
    /// # Safety
    /// `row < height()` and `col < width()` must hold.
    #[inline]
    pub unsafe fn set_unchecked(&mut self, row: usize, col: usize, value: f32) {
        *self.data.uget_mut([row, col]) = value;
    }

    /// Row-major view of the underlying buffer.
    pub fn as_slice(&self) -> &[f32] {
        self.data
            .as_slice()
            .expect("owned matrices are standard layout")
    }

    fn check_same_shape(&self, other: &Self, op: &str) -> Result<()> {
        if self.height() != other.height() || self.width() != other.width() {
            return Err(Error::InvalidInput(format!(
                "{op}: shape mismatch {}x{} vs {}x{}",
                self.height(),
                self.width(),
                other.height(),
                other.width()
            )));
        }
        Ok(())
    }

    /// Element-wise sum. Shapes must match.
    #[allow(clippy::should_implement_trait)]
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_same_shape(other, "add")?;
        Ok(Self {
            data: &self.data + &other.data,
        })
    }

    /// In-place element-wise sum.
    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        self.check_same_shape(other, "add_assign")?;
        self.data += &other.data;
        Ok(())
    }

    /// Element-wise difference. Shapes must match.
    #[allow(clippy::should_implement_trait)]
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_same_shape(other, "sub")?;
        Ok(Self {
            data: &self.data - &other.data,
        })
    }

    /// Element-wise (Hadamard) product. Shapes must match.
    pub fn hadamard(&self, other: &Self) -> Result<Self> {
        self.check_same_shape(other, "hadamard")?;
        Ok(Self {
            data: &self.data * &other.data,
        })
    }

    /// Matrix product `self × other`; `self.width()` must equal
    /// `other.height()`.
    pub fn matmul(&self, other: &Self) -> Result<Self> {
        if self.width() != other.height() {
            return Err(Error::InvalidInput(format!(
                "matmul: {}x{} is incompatible with {}x{}",
                self.height(),
                self.width(),
                other.height(),
                other.width()
            )));
        }
        Ok(Self {
            data: self.data.dot(&other.data),
        })
    }

    /// Out-of-place scalar multiplication.
    pub fn scale(&self, factor: f32) -> Self {
        Self {
            data: &self.data * factor,
        }
    }

    /// In-place scalar multiplication.
    pub fn scale_mut(&mut self, factor: f32) {
        self.data *= factor;
    }

    pub fn transpose(&self) -> Self {
        Self {
            data: self.data.t().to_owned(),
        }
    }

    /// Applies `f` to every coefficient, producing a new matrix.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            data: self.data.mapv(&f),
        }
    }

    /// Applies `f` to every coefficient in place.
    pub fn map_mut(&mut self, f: impl Fn(f32) -> f32) {
        self.data.mapv_inplace(&f);
    }

    pub fn sigmoid(&self) -> Self {
        self.map(sigmoid)
    }

    pub fn sigmoid_derivative(&self) -> Self {
        self.map(sigmoid_derivative)
    }

    pub fn sum(&self) -> f32 {
        self.data.sum()
    }

    /// Scales the matrix so its coefficients sum to 1.
    pub fn normalize(&self) -> Result<Self> {
        let total = self.sum();
        if total == 0.0 {
            return Err(Error::InvalidInput(
                "cannot normalize a matrix whose sum is zero".into(),
            ));
        }
        Ok(self.scale(1.0 / total))
    }

    /// Row index of the maximum coefficient in column `col`. Earlier rows
    /// win ties.
    pub fn argmax_column(&self, col: usize) -> usize {
        let mut best_row = 0;
        let mut best = self.at(0, col);
        for row in 1..self.height() {
            let v = self.at(row, col);
            if v > best {
                best = v;
                best_row = row;
            }
        }
        best_row
    }

    /// Reshapes to a `(h·w) × 1` column, preserving row-major order.
    pub fn flatten_vertical(&self) -> Self {
        let n = self.height() * self.width();
        let content: Vec<f32> = self.as_slice().to_vec();
        Self {
            data: Array2::from_shape_vec((n, 1), content).expect("length preserved"),
        }
    }

    /// Quantises every coefficient to 0 or 1 with a 0.5 threshold.
    pub fn one_hot(&self) -> Self {
        self.map(|v| if v > 0.5 { 1.0 } else { 0.0 })
    }

    /// Flips a binary matrix: 0 becomes 1 and anything else becomes 0.
    pub fn toggled(&self) -> Self {
        self.map(|v| if v == 0.0 { 1.0 } else { 0.0 })
    }

    /// Removes outer rows and columns that contain only zeros.
    ///
    /// Fails with [`Error::EmptyAfterStrip`] when the matrix has no
    /// non-zero coefficient at all.
    pub fn strip_margins(&self) -> Result<Self> {
        let (h, w) = (self.height(), self.width());
        let mut top = None;
        let mut bottom = 0;
        let mut left = w;
        let mut right = 0;

        for row in 0..h {
            for col in 0..w {
                if self.at(row, col) != 0.0 {
                    if top.is_none() {
                        top = Some(row);
                    }
                    bottom = row;
                    left = left.min(col);
                    right = right.max(col);
                }
            }
        }

        let top = top.ok_or(Error::EmptyAfterStrip)?;
        let out_h = bottom - top + 1;
        let out_w = right - left + 1;
        let mut out = Matrix::zeros(out_h, out_w)?;
        for row in 0..out_h {
            for col in 0..out_w {
                out.set(row, col, self.at(top + row, left + col));
            }
        }
        Ok(out)
    }

    /// Bilinear rescale onto a `side × side` canvas.
    ///
    /// The source is scaled uniformly so its larger dimension fits `side`,
    /// centred; destination pixels that map outside the source are set to
    /// `fill`.
    pub fn scale_to_square(&self, side: usize, fill: f32) -> Result<Self> {
        let (h, w) = (self.height() as f32, self.width() as f32);
        let factor = side as f32 / h.max(w);
        let off_x = (side as f32 - w * factor) / 2.0;
        let off_y = (side as f32 - h * factor) / 2.0;

        let mut out = Matrix::filled(side, side, fill)?;
        for row in 0..side {
            for col in 0..side {
                // Backward map through the centre of each destination pixel.
                let src_x = (col as f32 - off_x + 0.5) / factor - 0.5;
                let src_y = (row as f32 - off_y + 0.5) / factor - 0.5;
                if src_x < 0.0 || src_y < 0.0 || src_x > w - 1.0 || src_y > h - 1.0 {
                    continue;
                }
                let x0 = src_x.floor() as usize;
                let y0 = src_y.floor() as usize;
                let x1 = (x0 + 1).min(self.width() - 1);
                let y1 = (y0 + 1).min(self.height() - 1);
                let fx = src_x - x0 as f32;
                let fy = src_y - y0 as f32;

                let v = self.at(y0, x0) * (1.0 - fx) * (1.0 - fy)
                    + self.at(y0, x1) * fx * (1.0 - fy)
                    + self.at(y1, x0) * (1.0 - fx) * fy
                    + self.at(y1, x1) * fx * fy;
                out.set(row, col, v);
            }
        }
        Ok(out)
    }
}
