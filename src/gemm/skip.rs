//! Skip selection for the accelerated path
//!
//! A plan lists, for every output column, the K indices that are still
//! evaluated. Indices are kept in ascending order so accumulation order
//! matches the dense kernel for the surviving terms.

use crate::config::SkipPolicy;

/// Surviving K terms of one accelerated invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipPlan {
    /// Same kept indices for all `columns` output columns
    Shared {
        /// Kept K indices
        indices: Vec<usize>,
        /// Output columns the indices apply to
        columns: usize,
    },
    /// Kept indices per output column
    PerColumn(Vec<Vec<usize>>),
}

/// Number of K terms evaluated at the given sparsity
#[must_use]
pub fn kept_count(k: usize, sparsity: f32) -> usize {
    let skipped = (f64::from(sparsity) * k as f64).round() as usize;
    k - skipped.min(k)
}

impl SkipPlan {
    /// Build the plan for `B (k x n)` at `sparsity`
    #[must_use]
    pub fn build(policy: SkipPolicy, b: &[f32], k: usize, n: usize, sparsity: f32) -> Self {
        let kept = kept_count(k, sparsity);
        if kept == k {
            return Self::Shared {
                indices: (0..k).collect(),
                columns: n,
            };
        }
        match policy {
            SkipPolicy::Strided => Self::Shared {
                indices: strided(k, kept),
                columns: n,
            },
            SkipPolicy::Magnitude => {
                Self::PerColumn((0..n).map(|j| largest(b, k, n, j, kept)).collect())
            },
        }
    }

    /// Terms evaluated for one output row, summed over its columns
    #[must_use]
    pub fn kept_terms(&self) -> usize {
        match self {
            Self::Shared { indices, columns } => indices.len() * columns,
            Self::PerColumn(cols) => cols.iter().map(Vec::len).sum(),
        }
    }

    /// Accumulate the kept terms of one output row into `c_row`
    pub fn accumulate_row(&self, a_row: &[f32], b: &[f32], n: usize, c_row: &mut [f32]) {
        match self {
            Self::Shared { indices, .. } => {
                for &p in indices {
                    let a_ip = a_row[p];
                    let b_row = &b[p * n..(p + 1) * n];
                    for (c_ij, &b_pj) in c_row.iter_mut().zip(b_row) {
                        *c_ij += a_ip * b_pj;
                    }
                }
            },
            Self::PerColumn(cols) => {
                for (j, indices) in cols.iter().enumerate() {
                    let mut sum = 0.0f32;
                    for &p in indices {
                        sum += a_row[p] * b[p * n + j];
                    }
                    c_row[j] += sum;
                }
            },
        }
    }
}

/// `kept` indices spread evenly over `0..k`
fn strided(k: usize, kept: usize) -> Vec<usize> {
    (0..kept).map(|i| i * k / kept).collect()
}

/// Indices of the `kept` largest-magnitude entries of column `j`
fn largest(b: &[f32], k: usize, n: usize, j: usize, kept: usize) -> Vec<usize> {
    if kept == 0 {
        return Vec::new();
    }
    let magnitude = |p: usize| b[p * n + j].abs();
    let mut idx: Vec<usize> = (0..k).collect();
    idx.select_nth_unstable_by(kept - 1, |&x, &y| {
        magnitude(y).total_cmp(&magnitude(x)).then(x.cmp(&y))
    });
    idx.truncate(kept);
    idx.sort_unstable();
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kept_count() {
        assert_eq!(kept_count(100, 0.0), 100);
        assert_eq!(kept_count(100, 0.5), 50);
        assert_eq!(kept_count(100, 1.0), 0);
        assert_eq!(kept_count(3, 0.5), 1);
        assert_eq!(kept_count(4096, 0.6), 1638);
    }

    #[test]
    fn test_strided_is_spread_and_unique() {
        let idx = strided(10, 4);
        assert_eq!(idx, vec![0, 2, 5, 7]);
        let idx = strided(4096, 2048);
        assert_eq!(idx.len(), 2048);
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*idx.last().unwrap(), 4094);
    }

    #[test]
    fn test_magnitude_keeps_largest_activations() {
        // B is 5x2; column 0 activations: 0.1, -3, 0.2, 2, 0
        let b = vec![0.1, 1.0, -3.0, 1.0, 0.2, 1.0, 2.0, 1.0, 0.0, 1.0];
        let plan = SkipPlan::build(SkipPolicy::Magnitude, &b, 5, 2, 0.6);
        match &plan {
            SkipPlan::PerColumn(cols) => {
                assert_eq!(cols[0], vec![1, 3]);
                // ties broken by lowest index
                assert_eq!(cols[1], vec![0, 1]);
            },
            other => panic!("unexpected plan {other:?}"),
        }
        assert_eq!(plan.kept_terms(), 4);
    }

    #[test]
    fn test_zero_sparsity_keeps_everything() {
        for policy in [SkipPolicy::Strided, SkipPolicy::Magnitude] {
            let plan = SkipPlan::build(policy, &[1.0; 12], 4, 3, 0.0);
            assert_eq!(plan.kept_terms(), 12);
        }
    }

    #[test]
    fn test_accumulate_row_shared() {
        let plan = SkipPlan::Shared {
            indices: vec![0, 2],
            columns: 2,
        };
        // B is 3x2
        let b = vec![1.0, 2.0, 10.0, 20.0, 3.0, 4.0];
        let mut c = vec![0.0; 2];
        plan.accumulate_row(&[1.0, 1.0, 2.0], &b, 2, &mut c);
        assert_eq!(c, vec![7.0, 10.0]);
    }
}
