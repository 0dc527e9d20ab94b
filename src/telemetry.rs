//! Telemetry aggregation and reporting
//!
//! [`WorkCounters`] accumulates per-call [`GemmStats`]; a
//! [`TelemetrySnapshot`] freezes every counter of an engine at one instant
//! and renders it as a text report (via `Display`) or JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache::CacheCounters;
use crate::compression::CompressionCounters;
use crate::config::{CompressionMode, EnergyMode};
use crate::error::{Result, SparsimError};
use crate::gemm::GemmStats;
use crate::power::PowerStats;

/// Cumulative kernel work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCounters {
    /// Kernel invocations
    pub invocations: u64,
    /// Invocations that took the accelerated path
    pub accelerated_invocations: u64,
    /// MAC terms evaluated
    pub macs_performed: u64,
    /// MAC terms skipped
    pub macs_skipped: u64,
}

impl WorkCounters {
    /// Fold one call in
    pub fn record(&mut self, stats: &GemmStats) {
        self.invocations += 1;
        if stats.mode.is_accelerated() {
            self.accelerated_invocations += 1;
        }
        self.macs_performed += stats.macs_performed;
        self.macs_skipped += stats.macs_skipped;
    }

    /// Dense work divided by evaluated work, 1.0 with no calls
    #[must_use]
    pub fn effective_speedup(&self) -> f64 {
        let total = self.macs_performed + self.macs_skipped;
        if total == 0 {
            return 1.0;
        }
        total as f64 / self.macs_performed.max(1) as f64
    }
}

/// Point-in-time view of all engine statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Benchmark-mode flag at snapshot time
    pub benchmark_mode: bool,
    /// Kernel work
    pub work: WorkCounters,
    /// Raw cache counters
    pub cache: CacheCounters,
    /// L1 hit rate in `[0, 1]`
    pub l1_hit_rate: f64,
    /// L2 hit rate in `[0, 1]`
    pub l2_hit_rate: f64,
    /// Compression mode
    pub compression_mode: CompressionMode,
    /// Raw compression counters
    pub compression: CompressionCounters,
    /// Compression ratio, `>= 1`
    pub compression_ratio: f64,
    /// Fraction of sampled values assumed zero
    pub observed_sparsity: f64,
    /// Energy operating point
    pub energy_mode: EnergyMode,
    /// Power figures
    pub power: PowerStats,
    /// Tensors alive in the store
    pub live_tensors: u64,
}

impl TelemetrySnapshot {
    /// Pretty JSON rendering
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SparsimError::FormatError {
            reason: format!("telemetry serialization failed: {e}"),
        })
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(56);
        let mode = if self.benchmark_mode {
            "benchmark (sparse skip)"
        } else {
            "accuracy (dense)"
        };
        let compression = match self.compression_mode {
            CompressionMode::Classic => "classic",
            CompressionMode::ValueAware => "value-aware",
        };
        let energy = match self.energy_mode {
            EnergyMode::Eco => "eco",
            EnergyMode::Standard => "standard",
            EnergyMode::Performance => "performance",
        };

        writeln!(f, "{rule}")?;
        writeln!(f, " sparsim telemetry")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Mode:               {mode}")?;
        writeln!(
            f,
            "Kernel invocations: {} ({} accelerated)",
            self.work.invocations, self.work.accelerated_invocations
        )?;
        writeln!(
            f,
            "MACs:               {} performed, {} skipped",
            self.work.macs_performed, self.work.macs_skipped
        )?;
        writeln!(f, "Effective speedup:  {:.2}x", self.work.effective_speedup())?;
        writeln!(
            f,
            "L1 cache hit rate:  {:.2}% ({} / {} accesses)",
            self.l1_hit_rate * 100.0,
            self.cache.l1_hits,
            self.cache.l1_accesses
        )?;
        writeln!(
            f,
            "L2 cache hit rate:  {:.2}% ({} / {} accesses)",
            self.l2_hit_rate * 100.0,
            self.cache.l2_hits,
            self.cache.l2_accesses
        )?;
        writeln!(f, "Operand reuse:      {} calls", self.cache.reused_calls)?;
        writeln!(
            f,
            "Compression ratio:  {:.2}x ({compression})",
            self.compression_ratio
        )?;
        writeln!(
            f,
            "Zero values seen:   {} / {}",
            self.compression.value_zeros, self.compression.total_values
        )?;
        writeln!(f, "Observed sparsity:  {:.2}%", self.observed_sparsity * 100.0)?;
        writeln!(
            f,
            "Power:              {:.2} W (peak {:.2} W, {energy})",
            self.power.current_watts, self.power.peak_watts
        )?;
        writeln!(
            f,
            "Energy:             {:.4} mJ, {:.3} uJ/token",
            self.power.total_energy_pj / 1e9,
            self.power.pj_per_token / 1e6
        )?;
        writeln!(f, "Die temperature:    {:.1} C", self.power.die_temp_c)?;
        writeln!(f, "Live tensors:       {}", self.live_tensors)?;
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemm::{ExecutionMode, GemmShape};

    fn stats(mode: ExecutionMode, performed: u64, skipped: u64) -> GemmStats {
        GemmStats {
            shape: GemmShape { m: 1, n: 1, k: 1 },
            mode,
            sparsity: 0.5,
            macs_performed: performed,
            macs_skipped: skipped,
        }
    }

    fn snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot {
            benchmark_mode: true,
            work: WorkCounters::default(),
            cache: CacheCounters::default(),
            l1_hit_rate: 0.0,
            l2_hit_rate: 0.0,
            compression_mode: CompressionMode::ValueAware,
            compression: CompressionCounters::default(),
            compression_ratio: 1.0,
            observed_sparsity: 0.0,
            energy_mode: EnergyMode::Standard,
            power: PowerStats::default(),
            live_tensors: 0,
        }
    }

    #[test]
    fn test_work_counters() {
        let mut work = WorkCounters::default();
        assert_eq!(work.effective_speedup(), 1.0);
        work.record(&stats(ExecutionMode::Accelerated, 50, 50));
        work.record(&stats(ExecutionMode::Dense, 100, 0));
        assert_eq!(work.invocations, 2);
        assert_eq!(work.accelerated_invocations, 1);
        assert!((work.effective_speedup() - 200.0 / 150.0).abs() < 1e-12);
    }

    #[test]
    fn test_report_mentions_key_metrics() {
        let text = snapshot().to_string();
        assert!(text.contains("Kernel invocations"));
        assert!(text.contains("L1 cache hit rate"));
        assert!(text.contains("Compression ratio"));
        assert!(text.contains("benchmark"));
    }

    #[test]
    fn test_json_export() {
        let snap = snapshot();
        let json = snap.to_json().unwrap();
        let back: TelemetrySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
        assert!(json.contains("\"compression_ratio\""));
    }
}
