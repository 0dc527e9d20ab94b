//! Compression estimator
//!
//! Models how much smaller a value-aware representation of the weight
//! operand is than its dense form. Terms assumed to be zero are stored at
//! `1 / zero_cost_divisor` of their size:
//!
//! ```text
//! compressed = raw * (1 - s) + raw * s / divisor
//! ratio      = sum(raw) / sum(compressed)        (>= 1, <= divisor)
//! ```
//!
//! In [`CompressionMode::Classic`] zeros cost full size and the ratio stays 1.

use serde::{Deserialize, Serialize};

use crate::config::CompressionMode;

/// Accumulated byte and value counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionCounters {
    /// Bytes a dense representation would move
    pub bytes_raw: f64,
    /// Bytes after value-aware compression
    pub bytes_compressed: f64,
    /// Values assumed zero
    pub value_zeros: u64,
    /// Values sampled
    pub total_values: u64,
}

/// Running compression-ratio model
#[derive(Debug, Clone)]
pub struct CompressionEstimator {
    mode: CompressionMode,
    zero_cost_divisor: f64,
    counters: CompressionCounters,
}

impl CompressionEstimator {
    /// Estimator for `mode` with the given zero-cost divisor
    #[must_use]
    pub fn new(mode: CompressionMode, zero_cost_divisor: f64) -> Self {
        Self {
            mode,
            zero_cost_divisor: zero_cost_divisor.max(1.0),
            counters: CompressionCounters::default(),
        }
    }

    /// Compressed size of `raw_bytes` at `sparsity`
    #[must_use]
    pub fn compressed_size(&self, raw_bytes: f64, sparsity: f32) -> f64 {
        match self.mode {
            CompressionMode::Classic => raw_bytes,
            CompressionMode::ValueAware => {
                let s = f64::from(sparsity).clamp(0.0, 1.0);
                raw_bytes * (1.0 - s) + raw_bytes * s / self.zero_cost_divisor
            },
        }
    }

    /// Record one call over `values` weight elements of `value_bytes` each
    pub fn record(&mut self, values: u64, value_bytes: usize, sparsity: f32) {
        let raw = values as f64 * value_bytes as f64;
        let zeros = (f64::from(sparsity).clamp(0.0, 1.0) * values as f64).round() as u64;

        let compressed = self.compressed_size(raw, sparsity);
        let c = &mut self.counters;
        c.bytes_raw += raw;
        c.bytes_compressed += compressed;
        c.value_zeros += zeros.min(values);
        c.total_values += values;
    }

    /// Raw / compressed bytes, 1.0 before anything was recorded
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.counters.bytes_compressed > 0.0 {
            (self.counters.bytes_raw / self.counters.bytes_compressed).max(1.0)
        } else {
            1.0
        }
    }

    /// Fraction of sampled values assumed zero
    #[must_use]
    pub fn observed_sparsity(&self) -> f64 {
        if self.counters.total_values == 0 {
            0.0
        } else {
            self.counters.value_zeros as f64 / self.counters.total_values as f64
        }
    }

    /// Current counters
    #[must_use]
    pub fn counters(&self) -> CompressionCounters {
        self.counters
    }

    /// Active mode
    #[must_use]
    pub fn mode(&self) -> CompressionMode {
        self.mode
    }

    /// Zero the counters
    pub fn reset(&mut self) {
        self.counters = CompressionCounters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_ratio() {
        let est = CompressionEstimator::new(CompressionMode::ValueAware, 8.0);
        assert_eq!(est.ratio(), 1.0);
        assert_eq!(est.observed_sparsity(), 0.0);
    }

    #[test]
    fn test_dense_calls_do_not_compress() {
        let mut est = CompressionEstimator::new(CompressionMode::ValueAware, 8.0);
        est.record(1000, 4, 0.0);
        assert!((est.ratio() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_half_sparsity_ratio() {
        let mut est = CompressionEstimator::new(CompressionMode::ValueAware, 8.0);
        est.record(1000, 4, 0.5);
        // 1 / (0.5 + 0.5 / 8)
        assert!((est.ratio() - 1.0 / 0.5625).abs() < 1e-9);
        assert!((est.observed_sparsity() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_full_sparsity_is_bounded() {
        let mut est = CompressionEstimator::new(CompressionMode::ValueAware, 8.0);
        est.record(10, 4, 1.0);
        assert!((est.ratio() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_in_sparsity() {
        let mut last = 1.0;
        for step in 0..=20 {
            let s = step as f32 / 20.0;
            let mut est = CompressionEstimator::new(CompressionMode::ValueAware, 8.0);
            est.record(4096, 4, s);
            let r = est.ratio();
            assert!(r >= 1.0);
            assert!(r >= last, "ratio dropped at sparsity {s}");
            last = r;
        }
    }

    #[test]
    fn test_classic_mode_never_compresses() {
        let mut est = CompressionEstimator::new(CompressionMode::Classic, 8.0);
        est.record(1000, 4, 0.9);
        assert_eq!(est.ratio(), 1.0);
        assert!(est.observed_sparsity() > 0.8);
    }

    #[test]
    fn test_reset() {
        let mut est = CompressionEstimator::new(CompressionMode::ValueAware, 8.0);
        est.record(1000, 4, 0.7);
        est.reset();
        assert_eq!(est.ratio(), 1.0);
        assert_eq!(est.counters().total_values, 0);
    }
}
