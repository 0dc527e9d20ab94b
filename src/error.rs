//! Error types for the simulator
//!
//! Every failure is a caller-correctness issue reported synchronously at the
//! call boundary. A failed operation never mutates engine state.

use thiserror::Error;

use crate::store::TensorHandle;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SparsimError>;

/// Errors produced by the simulated accelerator
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SparsimError {
    /// Engine could not be initialized (configuration missing or unreadable)
    #[error("Failed to load engine: {reason}")]
    Load {
        /// Why initialization failed
        reason: String,
    },

    /// Tensor creation requested with a non-positive dimension
    #[error("Invalid tensor dimensions {rows}x{cols}: both must be >= 1")]
    InvalidDimension {
        /// Requested row count
        rows: i64,
        /// Requested column count
        cols: i64,
    },

    /// Handle is unknown or has already been released
    #[error("Invalid tensor handle: {handle}")]
    InvalidHandle {
        /// Offending handle
        handle: TensorHandle,
    },

    /// GEMM operands have incompatible shapes
    #[error(
        "GEMM dimension mismatch: A is {a_rows}x{a_cols}, B is {b_rows}x{b_cols}, C is {c_rows}x{c_cols}"
    )]
    DimensionMismatch {
        /// Rows of A
        a_rows: usize,
        /// Columns of A
        a_cols: usize,
        /// Rows of B
        b_rows: usize,
        /// Columns of B
        b_cols: usize,
        /// Rows of C
        c_rows: usize,
        /// Columns of C
        c_cols: usize,
    },

    /// Sparsity argument outside `[0.0, 1.0]`
    #[error("Invalid sparsity {value}: must be within [0.0, 1.0]")]
    InvalidSparsity {
        /// Value passed by the caller
        value: f32,
    },

    /// Malformed model-file header
    #[error("Format error: {reason}")]
    FormatError {
        /// Description of the malformation
        reason: String,
    },

    /// Filesystem failure while reading or writing a model header
    #[error("I/O error: {message}")]
    IoError {
        /// Underlying error text
        message: String,
    },

    /// Configuration value out of range
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Which value is wrong and why
        reason: String,
    },

    /// Kernel output deviates from the scalar reference
    #[error("Verification failed: relative error {max_rel_error:e} exceeds {tolerance:e}")]
    VerificationFailed {
        /// Largest relative error observed
        max_rel_error: f32,
        /// Allowed relative error
        tolerance: f32,
    },
}

impl From<std::io::Error> for SparsimError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            message: err.to_string(),
        }
    }
}
