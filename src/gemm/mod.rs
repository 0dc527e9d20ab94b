//! Sparsity-aware GEMM kernel
//!
//! Computes `C (MxN) = A (MxK) * B (KxN)` over row-major `f32` slices.
//!
//! Two execution paths exist:
//!
//! - **Dense** ([`ExecutionMode::Dense`]): the full K-term dot product, run
//!   through the blocked [`TiledKernel`]. `sparsity` is ignored for compute.
//! - **Accelerated** ([`ExecutionMode::Accelerated`]): a [`SkipPlan`] drops
//!   `round(sparsity * K)` accumulation terms per output column, the work a
//!   sparse accelerator avoids because the matching activations are zero.
//!
//! At `sparsity == 0.0` both paths produce the dense product.

mod kernel;
mod skip;

pub use kernel::{MicroKernel, ScalarKernel, TiledKernel};
pub use skip::SkipPlan;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{SkipPolicy, TilingConfig};
use crate::error::{Result, SparsimError};

/// Which path a kernel invocation takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Accuracy validation: always the full product
    #[default]
    Dense,
    /// Benchmark: sparsity-skipping path
    Accelerated,
}

impl ExecutionMode {
    /// Mode selected by a benchmark-mode flag
    #[must_use]
    pub fn from_benchmark_flag(enabled: bool) -> Self {
        if enabled {
            Self::Accelerated
        } else {
            Self::Dense
        }
    }

    /// Whether this is the accelerated path
    #[must_use]
    pub fn is_accelerated(self) -> bool {
        self == Self::Accelerated
    }
}

/// Problem size of one GEMM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemmShape {
    /// Rows of A and C
    pub m: usize,
    /// Columns of B and C
    pub n: usize,
    /// Shared inner dimension
    pub k: usize,
}

impl GemmShape {
    /// Derive the problem size from operand shapes
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` unless `A.cols == B.rows`,
    /// `C.rows == A.rows` and `C.cols == B.cols`.
    pub fn from_operands(
        a: (usize, usize),
        b: (usize, usize),
        c: (usize, usize),
    ) -> Result<Self> {
        if a.1 != b.0 || c.0 != a.0 || c.1 != b.1 {
            return Err(SparsimError::DimensionMismatch {
                a_rows: a.0,
                a_cols: a.1,
                b_rows: b.0,
                b_cols: b.1,
                c_rows: c.0,
                c_cols: c.1,
            });
        }
        Ok(Self {
            m: a.0,
            n: b.1,
            k: a.1,
        })
    }

    /// Multiply-accumulate terms of the dense product
    #[must_use]
    pub fn dense_macs(&self) -> u64 {
        self.m as u64 * self.n as u64 * self.k as u64
    }

    /// Micro-tiles visited by the blocked traversal
    #[must_use]
    pub fn micro_tiles(&self, tiling: &TilingConfig) -> u64 {
        let mt = self.m.div_ceil(tiling.mr) as u64;
        let nt = self.n.div_ceil(tiling.nr) as u64;
        let kt = self.k.div_ceil(tiling.kc) as u64;
        mt * nt * kt
    }
}

/// Work accounting for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GemmStats {
    /// Problem size
    pub shape: GemmShape,
    /// Path taken
    pub mode: ExecutionMode,
    /// Sparsity argument of the call
    pub sparsity: f32,
    /// MAC terms actually evaluated
    pub macs_performed: u64,
    /// MAC terms skipped as assumed-zero
    pub macs_skipped: u64,
}

impl GemmStats {
    /// Fraction of dense work that was evaluated
    #[must_use]
    pub fn work_fraction(&self) -> f64 {
        let total = self.macs_performed + self.macs_skipped;
        if total == 0 {
            return 1.0;
        }
        self.macs_performed as f64 / total as f64
    }
}

/// Parameters shared by every invocation of an engine
#[derive(Debug, Clone, Copy)]
pub struct KernelParams {
    /// Dense blocking
    pub tiling: TilingConfig,
    /// Skip selection for the accelerated path
    pub skip_policy: SkipPolicy,
    /// `M*N*K` above which rows are spread over worker threads
    pub parallel_threshold: usize,
}

/// Validate a sparsity argument
///
/// # Errors
///
/// Returns `InvalidSparsity` for NaN or values outside `[0, 1]`.
pub fn check_sparsity(sparsity: f32) -> Result<()> {
    if (0.0..=1.0).contains(&sparsity) {
        Ok(())
    } else {
        Err(SparsimError::InvalidSparsity { value: sparsity })
    }
}

/// Run one GEMM, overwriting `c`
///
/// `a`, `b`, `c` must hold exactly `m*k`, `k*n`, `m*n` elements.
///
/// # Errors
///
/// Returns `InvalidSparsity` for a bad `sparsity`, `DimensionMismatch` if a
/// buffer length disagrees with `shape`.
pub fn execute(
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    shape: GemmShape,
    mode: ExecutionMode,
    sparsity: f32,
    params: &KernelParams,
) -> Result<GemmStats> {
    check_sparsity(sparsity)?;
    let GemmShape { m, n, k } = shape;
    if a.len() != m * k || b.len() != k * n || c.len() != m * n {
        return Err(SparsimError::DimensionMismatch {
            a_rows: m,
            a_cols: a.len() / m.max(1),
            b_rows: k,
            b_cols: b.len() / k.max(1),
            c_rows: m,
            c_cols: c.len() / m.max(1),
        });
    }

    c.fill(0.0);
    let dense = shape.dense_macs();
    let parallel = dense as usize >= params.parallel_threshold;

    let performed = match mode {
        ExecutionMode::Dense => {
            run_dense(a, b, c, shape, &params.tiling, parallel);
            dense
        },
        ExecutionMode::Accelerated => {
            let plan = SkipPlan::build(params.skip_policy, b, k, n, sparsity);
            run_sparse(a, b, c, shape, &plan, parallel);
            plan.kept_terms() as u64 * m as u64
        },
    };

    Ok(GemmStats {
        shape,
        mode,
        sparsity,
        macs_performed: performed,
        macs_skipped: dense - performed,
    })
}

fn run_dense(
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    shape: GemmShape,
    tiling: &TilingConfig,
    parallel: bool,
) {
    let GemmShape { m, n, k } = shape;
    let kernel = TiledKernel::new(*tiling);
    if !parallel {
        kernel.gemm(a, b, c, m, n, k);
        return;
    }

    let rows_per_task = tiling.mr * 8;
    c.par_chunks_mut(rows_per_task * n)
        .enumerate()
        .for_each(|(chunk, c_block)| {
            let row0 = chunk * rows_per_task;
            let rows = c_block.len() / n;
            kernel.gemm(&a[row0 * k..(row0 + rows) * k], b, c_block, rows, n, k);
        });
}

fn run_sparse(a: &[f32], b: &[f32], c: &mut [f32], shape: GemmShape, plan: &SkipPlan, parallel: bool) {
    let GemmShape { n, k, .. } = shape;
    let row = |(i, c_row): (usize, &mut [f32])| {
        let a_row = &a[i * k..(i + 1) * k];
        plan.accumulate_row(a_row, b, n, c_row);
    };

    if parallel {
        c.par_chunks_mut(n).enumerate().for_each(row);
    } else {
        c.chunks_mut(n).enumerate().for_each(row);
    }
}
