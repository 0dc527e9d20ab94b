//! Dense micro-kernels
//!
//! Both kernels accumulate `C += A * B` on contiguous row-major blocks, so
//! callers zero `C` first when they want a plain product.

use crate::config::TilingConfig;

/// A register-level GEMM implementation
pub trait MicroKernel: Send + Sync {
    /// Accumulate `C (m x n) += A (m x k) * B (k x n)`
    fn gemm(&self, a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize);

    /// Human-readable kernel name
    fn name(&self) -> &'static str;
}

/// Naive triple loop, the numerical reference
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarKernel;

impl MicroKernel for ScalarKernel {
    fn gemm(&self, a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) {
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0f32;
                for p in 0..k {
                    sum += a[i * k + p] * b[p * n + j];
                }
                c[i * n + j] += sum;
            }
        }
    }

    fn name(&self) -> &'static str {
        "scalar"
    }
}

/// Cache-blocked kernel: K panels of depth `kc`, `mr x nr` micro-tiles
///
/// Inside a micro-tile each A element is broadcast against a contiguous
/// slice of a B row, which keeps the inner loop unit-stride.
#[derive(Debug, Clone, Copy)]
pub struct TiledKernel {
    tiling: TilingConfig,
}

impl TiledKernel {
    /// Kernel with the given blocking
    #[must_use]
    pub fn new(tiling: TilingConfig) -> Self {
        Self { tiling }
    }

    /// Blocking in use
    #[must_use]
    pub fn tiling(&self) -> TilingConfig {
        self.tiling
    }
}

impl Default for TiledKernel {
    fn default() -> Self {
        Self::new(TilingConfig::default())
    }
}

impl MicroKernel for TiledKernel {
    fn gemm(&self, a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) {
        let TilingConfig { mr, nr, kc } = self.tiling;

        for k0 in (0..k).step_by(kc) {
            let k1 = (k0 + kc).min(k);
            for n0 in (0..n).step_by(nr) {
                let n1 = (n0 + nr).min(n);
                for m0 in (0..m).step_by(mr) {
                    let m1 = (m0 + mr).min(m);
                    for i in m0..m1 {
                        let a_row = &a[i * k..(i + 1) * k];
                        let c_tile = &mut c[i * n + n0..i * n + n1];
                        for p in k0..k1 {
                            let a_ip = a_row[p];
                            let b_tile = &b[p * n + n0..p * n + n1];
                            for (c_ij, &b_pj) in c_tile.iter_mut().zip(b_tile) {
                                *c_ij += a_ip * b_pj;
                            }
                        }
                    }
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "tiled"
    }
}
