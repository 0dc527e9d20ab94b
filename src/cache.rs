//! Simulated L1/L2 cache model
//!
//! The simulator does not trace addresses. Each kernel call visits a known
//! number of micro-tiles; every visit is one L1 access. The share of those
//! accesses that hit grows with the call's sparsity (fewer weight rows are
//! streamed, so the surviving ones stay resident) and with operand reuse
//! (the same A and B as the previous call are still warm).
//!
//! ```text
//! p_hit = clamp(base + sparsity_gain * s + reuse_gain * reused, 0, 1)
//! hits  = round(p_hit * accesses)
//! ```
//!
//! L1 misses fall through to L2, which hits at a fixed rate.

use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;
use crate::store::TensorHandle;

/// Raw counters of the cache model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCounters {
    /// L1 accesses
    pub l1_accesses: u64,
    /// L1 hits
    pub l1_hits: u64,
    /// L2 accesses (equal to L1 misses)
    pub l2_accesses: u64,
    /// L2 hits
    pub l2_hits: u64,
    /// Calls whose A and B matched the previous call
    pub reused_calls: u64,
}

impl CacheCounters {
    /// L1 misses
    #[must_use]
    pub fn l1_misses(&self) -> u64 {
        self.l1_accesses - self.l1_hits
    }
}

/// One call's access pattern as seen by the cache
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccessPattern {
    /// Weight operand
    pub a: TensorHandle,
    /// Activation operand
    pub b: TensorHandle,
    /// Micro-tiles visited
    pub accesses: u64,
    /// Sparsity of the call
    pub sparsity: f32,
}

/// Outcome of classifying one call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallClassification {
    /// Whether A and B matched the previous call
    pub reused: bool,
    /// Hit probability applied
    pub hit_probability: f64,
    /// L1 hits recorded
    pub hits: u64,
    /// L1 misses recorded
    pub misses: u64,
}

/// Running hit/miss model
#[derive(Debug, Clone, Default)]
pub struct CacheSimulator {
    config: CacheConfig,
    counters: CacheCounters,
    last_operands: Option<(TensorHandle, TensorHandle)>,
}

impl CacheSimulator {
    /// Simulator with the given parameters
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            counters: CacheCounters::default(),
            last_operands: None,
        }
    }

    /// Hit probability for a call with `sparsity` and reuse state
    #[must_use]
    pub fn hit_probability(&self, sparsity: f32, reused: bool) -> f64 {
        let reuse = if reused { self.config.reuse_gain } else { 0.0 };
        (self.config.base_hit_rate + self.config.sparsity_gain * f64::from(sparsity) + reuse)
            .clamp(0.0, 1.0)
    }

    /// Classify one call and fold it into the counters
    pub fn record(&mut self, pattern: AccessPattern) -> CallClassification {
        let reused = self.last_operands == Some((pattern.a, pattern.b));
        self.last_operands = Some((pattern.a, pattern.b));

        let p = self.hit_probability(pattern.sparsity, reused);
        let hits = ((p * pattern.accesses as f64).round() as u64).min(pattern.accesses);
        let misses = pattern.accesses - hits;
        let l2_hits = (self.config.l2_hit_rate * misses as f64).round() as u64;

        let c = &mut self.counters;
        c.l1_accesses += pattern.accesses;
        c.l1_hits += hits;
        c.l2_accesses += misses;
        c.l2_hits += l2_hits.min(misses);
        if reused {
            c.reused_calls += 1;
        }

        CallClassification {
            reused,
            hit_probability: p,
            hits,
            misses,
        }
    }

    /// L1 hits / L1 accesses, 0.0 before any access
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        ratio(self.counters.l1_hits, self.counters.l1_accesses)
    }

    /// L2 hits / L2 accesses, 0.0 before any L2 access
    #[must_use]
    pub fn l2_hit_rate(&self) -> f64 {
        ratio(self.counters.l2_hits, self.counters.l2_accesses)
    }

    /// Current counters
    #[must_use]
    pub fn counters(&self) -> CacheCounters {
        self.counters
    }

    /// Zero the counters and forget the previous operands
    pub fn reset(&mut self) {
        self.counters = CacheCounters::default();
        self.last_operands = None;
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
