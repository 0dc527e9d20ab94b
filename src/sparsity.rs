//! Block-level sparsity profiling
//!
//! A [`SparsityMask`] marks which `block_rows x block_cols` tiles of a
//! tensor hold only zeros. A scheduler can skip those tiles outright; the
//! element-level zero fraction is a measured sparsity to pass to the kernel.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SparsimError};
use crate::tensor::Tensor;

/// Bitmap of all-zero blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparsityMask {
    block_rows: usize,
    block_cols: usize,
    row_blocks: usize,
    col_blocks: usize,
    zero_blocks: Vec<bool>,
    zero_values: u64,
    total_values: u64,
}

impl SparsityMask {
    /// Scan `tensor` in `block_rows x block_cols` tiles
    ///
    /// Edge tiles are partial when the shape is not a multiple of the block.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if a block dimension is zero.
    pub fn generate(tensor: &Tensor, block_rows: usize, block_cols: usize) -> Result<Self> {
        if block_rows == 0 || block_cols == 0 {
            return Err(SparsimError::InvalidConfiguration {
                reason: format!("block {block_rows}x{block_cols} must be non-zero"),
            });
        }
        let (rows, cols) = tensor.shape();
        let row_blocks = rows.div_ceil(block_rows);
        let col_blocks = cols.div_ceil(block_cols);
        let mut zero_blocks = vec![true; row_blocks * col_blocks];
        let mut zero_values = 0u64;

        for (r, row) in tensor.data().chunks(cols).enumerate() {
            let base = (r / block_rows) * col_blocks;
            for (c, &v) in row.iter().enumerate() {
                if v == 0.0 {
                    zero_values += 1;
                } else {
                    zero_blocks[base + c / block_cols] = false;
                }
            }
        }

        Ok(Self {
            block_rows,
            block_cols,
            row_blocks,
            col_blocks,
            zero_blocks,
            zero_values,
            total_values: tensor.len() as u64,
        })
    }

    /// Block grid as `(row_blocks, col_blocks)`
    #[must_use]
    pub fn grid(&self) -> (usize, usize) {
        (self.row_blocks, self.col_blocks)
    }

    /// Block size as `(block_rows, block_cols)`
    #[must_use]
    pub fn block(&self) -> (usize, usize) {
        (self.block_rows, self.block_cols)
    }

    /// Whether block `(br, bc)` is all zeros; `None` out of range
    #[must_use]
    pub fn is_zero_block(&self, br: usize, bc: usize) -> Option<bool> {
        if br >= self.row_blocks || bc >= self.col_blocks {
            return None;
        }
        Some(self.zero_blocks[br * self.col_blocks + bc])
    }

    /// Number of all-zero blocks
    #[must_use]
    pub fn zero_block_count(&self) -> usize {
        self.zero_blocks.iter().filter(|&&z| z).count()
    }

    /// Fraction of blocks that are all zeros
    #[must_use]
    pub fn block_sparsity(&self) -> f64 {
        if self.zero_blocks.is_empty() {
            return 0.0;
        }
        self.zero_block_count() as f64 / self.zero_blocks.len() as f64
    }

    /// Fraction of elements equal to zero
    #[must_use]
    pub fn zero_fraction(&self) -> f64 {
        if self.total_values == 0 {
            return 0.0;
        }
        self.zero_values as f64 / self.total_values as f64
    }
}
