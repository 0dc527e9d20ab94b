//! Engine configuration
//!
//! Every tunable of the simulated accelerator lives in [`EngineConfig`]. The
//! defaults model a small client NPU (64-byte lines, 6x16 register tiles,
//! 256-deep K panels). Configurations can be loaded from JSON files so a
//! benchmark run can be reproduced exactly.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SparsimError};

/// Seed used when none is configured
pub const DEFAULT_SEED: u64 = 42;

/// How the compression estimator treats values assumed to be zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    /// Spatial/temporal cache only; zeros cost as much as any value
    Classic,
    /// Value-aware cache: zero runs are stored at a fraction of their size
    #[default]
    ValueAware,
}

/// Which accumulation terms the accelerated path drops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipPolicy {
    /// Evenly spread over K, independent of the data
    #[default]
    Strided,
    /// Drop the terms whose activation (B element) has the smallest magnitude
    Magnitude,
}

/// Operating point used by the power model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyMode {
    /// Lowered voltage and frequency
    Eco,
    /// Nominal operation
    #[default]
    Standard,
    /// Boosted clocks, higher per-op cost
    Performance,
}

/// Cache simulator parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache line size in bytes
    pub line_bytes: usize,
    /// Hit probability of a dense call with fresh operands
    pub base_hit_rate: f64,
    /// Added hit probability per unit of sparsity
    pub sparsity_gain: f64,
    /// Added hit probability when A and B match the previous call
    pub reuse_gain: f64,
    /// Fraction of L1 misses served by L2
    pub l2_hit_rate: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            line_bytes: 64,
            base_hit_rate: 0.55,
            sparsity_gain: 0.30,
            reuse_gain: 0.10,
            l2_hit_rate: 0.80,
        }
    }
}

/// Register/cache blocking of the dense kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Micro-tile rows
    pub mr: usize,
    /// Micro-tile columns
    pub nr: usize,
    /// K panel depth
    pub kc: usize,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            mr: 6,
            nr: 16,
            kc: 256,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for tensor randomization
    pub seed: u64,
    /// Cache simulator parameters
    pub cache: CacheConfig,
    /// Compression estimator mode
    pub compression: CompressionMode,
    /// Storage cost divisor applied to zero values in value-aware mode
    pub zero_cost_divisor: f64,
    /// Dense kernel blocking
    pub tiling: TilingConfig,
    /// Skip selection of the accelerated path
    pub skip_policy: SkipPolicy,
    /// Power model operating point
    pub energy_mode: EnergyMode,
    /// Minimum `M*N*K` before rows are split across worker threads
    pub parallel_threshold: usize,
    /// Initial benchmark-mode flag
    pub benchmark_mode: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            cache: CacheConfig::default(),
            compression: CompressionMode::default(),
            zero_cost_divisor: 8.0,
            tiling: TilingConfig::default(),
            skip_policy: SkipPolicy::default(),
            energy_mode: EnergyMode::default(),
            parallel_threshold: 1 << 18,
            benchmark_mode: false,
        }
    }
}

impl EngineConfig {
    /// Set the randomization seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the compression mode
    #[must_use]
    pub fn with_compression(mut self, mode: CompressionMode) -> Self {
        self.compression = mode;
        self
    }

    /// Set the skip policy
    #[must_use]
    pub fn with_skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.skip_policy = policy;
        self
    }

    /// Set the energy mode
    #[must_use]
    pub fn with_energy_mode(mut self, mode: EnergyMode) -> Self {
        self.energy_mode = mode;
        self
    }

    /// Set the cache parameters
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the dense kernel blocking
    #[must_use]
    pub fn with_tiling(mut self, tiling: TilingConfig) -> Self {
        self.tiling = tiling;
        self
    }

    /// Set the initial benchmark-mode flag
    #[must_use]
    pub fn with_benchmark_mode(mut self, enabled: bool) -> Self {
        self.benchmark_mode = enabled;
        self
    }

    /// Set the parallelization threshold
    #[must_use]
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Check every value is in range
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` naming the first bad value.
    pub fn validate(&self) -> Result<()> {
        let probabilities = [
            ("cache.base_hit_rate", self.cache.base_hit_rate),
            ("cache.sparsity_gain", self.cache.sparsity_gain),
            ("cache.reuse_gain", self.cache.reuse_gain),
            ("cache.l2_hit_rate", self.cache.l2_hit_rate),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(SparsimError::InvalidConfiguration {
                    reason: format!("{name} = {value} must be within [0, 1]"),
                });
            }
        }

        if self.cache.line_bytes == 0 {
            return Err(SparsimError::InvalidConfiguration {
                reason: "cache.line_bytes must be > 0".to_string(),
            });
        }

        if !(self.zero_cost_divisor >= 1.0 && self.zero_cost_divisor.is_finite()) {
            return Err(SparsimError::InvalidConfiguration {
                reason: format!(
                    "zero_cost_divisor = {} must be finite and >= 1",
                    self.zero_cost_divisor
                ),
            });
        }

        let t = &self.tiling;
        if t.mr == 0 || t.nr == 0 || t.kc == 0 {
            return Err(SparsimError::InvalidConfiguration {
                reason: format!("tiling {}x{}x{} must be non-zero", t.mr, t.nr, t.kc),
            });
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `Load` on malformed JSON, `InvalidConfiguration` on bad values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| SparsimError::Load {
            reason: format!("invalid configuration JSON: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    ///
    /// # Errors
    ///
    /// Returns `Load` if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SparsimError::Load {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_json_str(&text)
    }

    /// Pretty JSON rendering
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SparsimError::InvalidConfiguration {
            reason: e.to_string(),
        })
    }
}
