//! Tensor implementation
//!
//! This module provides the two-dimensional `f32` buffer that lives behind
//! every [`TensorHandle`](crate::store::TensorHandle). Storage is a single
//! contiguous row-major `Vec<f32>` of exactly `rows * cols` elements.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SparsimError};

/// Two-dimensional row-major `f32` matrix
///
/// # Examples
///
/// ```
/// use sparsim::Tensor;
///
/// let t = Tensor::from_vec(2, 3, vec![
///     1.0, 2.0, 3.0,
///     4.0, 5.0, 6.0,
/// ]).unwrap();
///
/// assert_eq!(t.shape(), (2, 3));
/// assert_eq!(t.len(), 6);
/// assert_eq!(t.get(1, 2), Some(6.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// Number of rows
    rows: usize,
    /// Number of columns
    cols: usize,
    /// Flattened data in row-major order
    data: Vec<f32>,
}

impl Tensor {
    /// Create a zero-filled tensor
    ///
    /// # Errors
    ///
    /// Returns `InvalidDimension` if `rows` or `cols` is not positive, or
    /// if the buffer would exceed `isize::MAX` bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use sparsim::Tensor;
    ///
    /// let t = Tensor::zeros(4, 4).unwrap();
    /// assert!(t.data().iter().all(|&v| v == 0.0));
    /// ```
    pub fn zeros(rows: i64, cols: i64) -> Result<Self> {
        let (r, c) = checked_dims(rows, cols)?;
        Ok(Self::zeroed(r, c))
    }

    /// Zero-filled tensor from dimensions already accepted by `checked_dims`
    pub(crate) fn zeroed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Create a tensor from a flattened row-major vector
    ///
    /// # Errors
    ///
    /// Returns `InvalidDimension` if a dimension is zero, or
    /// `InvalidConfiguration` if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(SparsimError::InvalidDimension {
                rows: rows as i64,
                cols: cols as i64,
            });
        }

        let expected = rows * cols;
        if data.len() != expected {
            return Err(SparsimError::InvalidConfiguration {
                reason: format!(
                    "data length {} does not match shape {}x{} (expected {})",
                    data.len(),
                    rows,
                    cols,
                    expected
                ),
            });
        }

        Ok(Self { rows, cols, data })
    }

    /// Row count
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column count
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: a tensor holds at least one element
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read-only view of the buffer
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable view of the buffer
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Element at `(row, col)`, or `None` when out of bounds
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    /// Fill every element with `value`
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Fill with values drawn uniformly from `[-1.0, 1.0)`
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for v in &mut self.data {
            *v = rng.gen_range(-1.0..1.0);
        }
    }

    /// Size of the buffer in bytes
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Validate signed dimensions coming from the call surface
///
/// Accepted dimensions always describe a buffer the allocator can represent:
/// `rows * cols * size_of::<f32>()` fits in `isize::MAX`.
pub(crate) fn checked_dims(rows: i64, cols: i64) -> Result<(usize, usize)> {
    if rows <= 0 || cols <= 0 {
        return Err(SparsimError::InvalidDimension { rows, cols });
    }
    let r = usize::try_from(rows).map_err(|_| SparsimError::InvalidDimension { rows, cols })?;
    let c = usize::try_from(cols).map_err(|_| SparsimError::InvalidDimension { rows, cols })?;
    r.checked_mul(c)
        .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
        .filter(|&bytes| bytes <= isize::MAX as usize)
        .ok_or(SparsimError::InvalidDimension { rows, cols })?;
    Ok((r, c))
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({}x{}, data=[", self.rows, self.cols)?;
        const PREVIEW: usize = 8;
        for (i, val) in self.data.iter().take(PREVIEW).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{val}")?;
        }
        if self.data.len() > PREVIEW {
            write!(f, ", ...")?;
        }
        write!(f, "])")
    }
}
