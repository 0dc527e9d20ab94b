//! Power, energy and thermal estimates
//!
//! Every kernel call reports its operation count and bytes moved. Skipped
//! work costs nothing, so both are discounted by the call's sparsity before
//! being priced at a fixed picojoule cost per op and per byte. The
//! [`EnergyMode`] scales those costs and the idle-relative power draw.

use serde::{Deserialize, Serialize};

use crate::config::EnergyMode;

/// Energy per arithmetic operation (pJ)
pub const PJ_PER_OP: f64 = 1.2;
/// Energy per byte moved (pJ)
pub const PJ_PER_BYTE: f64 = 20.0;
/// Host idle draw (W)
pub const IDLE_POWER_W: f64 = 65.0;
/// Die-to-ambient thermal resistance (C/W)
pub const THERMAL_RESISTANCE: f64 = 0.5;
/// Ambient temperature (C)
pub const AMBIENT_TEMP_C: f64 = 25.0;
/// Operations per generated token of a 1B-parameter model
pub const OPS_PER_TOKEN: f64 = 2e9;
/// Memory traffic saved by a fused kernel
const FUSED_MEMORY_FACTOR: f64 = 0.6;

/// Per-mode cost multipliers
#[derive(Debug, Clone, Copy, PartialEq)]
struct ModeScale {
    op: f64,
    mem: f64,
    power: f64,
}

impl From<EnergyMode> for ModeScale {
    fn from(mode: EnergyMode) -> Self {
        match mode {
            EnergyMode::Eco => Self {
                op: 0.6,
                mem: 0.8,
                power: 12.0,
            },
            EnergyMode::Standard => Self {
                op: 1.0,
                mem: 1.0,
                power: 20.0,
            },
            EnergyMode::Performance => Self {
                op: 1.2,
                mem: 1.0,
                power: 28.0,
            },
        }
    }
}

/// Derived power figures
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerStats {
    /// Current draw including idle (W)
    pub current_watts: f64,
    /// Highest draw observed since the last reset (W)
    pub peak_watts: f64,
    /// Energy spent on ops and memory (pJ)
    pub total_energy_pj: f64,
    /// Energy per estimated token (pJ), 0 with no activity
    pub pj_per_token: f64,
    /// Estimated die temperature (C)
    pub die_temp_c: f64,
}

/// Running activity accumulator
#[derive(Debug, Clone)]
pub struct PowerModel {
    mode: EnergyMode,
    total_ops: f64,
    total_bytes: f64,
    activities: u64,
    peak_watts: f64,
}

impl PowerModel {
    /// Model operating in `mode`
    #[must_use]
    pub fn new(mode: EnergyMode) -> Self {
        Self {
            mode,
            total_ops: 0.0,
            total_bytes: 0.0,
            activities: 0,
            peak_watts: IDLE_POWER_W,
        }
    }

    /// Record one unit of work
    ///
    /// `ops` and `bytes` are the dense figures; the model charges only the
    /// `1 - sparsity` share, and a fused call moves 40% fewer bytes.
    pub fn record_activity(&mut self, ops: u64, bytes: u64, sparsity: f32, fused: bool) {
        let live = 1.0 - f64::from(sparsity).clamp(0.0, 1.0);
        let mut mem = bytes as f64 * live;
        if fused {
            mem *= FUSED_MEMORY_FACTOR;
        }
        self.total_ops += ops as f64 * live;
        self.total_bytes += mem;
        self.activities += 1;

        let watts = self.current_watts();
        if watts > self.peak_watts {
            self.peak_watts = watts;
        }
    }

    /// Total energy so far (pJ)
    #[must_use]
    pub fn total_energy_pj(&self) -> f64 {
        let scale = ModeScale::from(self.mode);
        self.total_ops * PJ_PER_OP * scale.op + self.total_bytes * PJ_PER_BYTE * scale.mem
    }

    fn current_watts(&self) -> f64 {
        IDLE_POWER_W + self.total_energy_pj() * 1e-12 * ModeScale::from(self.mode).power
    }

    /// Snapshot of the derived figures
    #[must_use]
    pub fn stats(&self) -> PowerStats {
        let total_energy_pj = self.total_energy_pj();
        let current_watts = self.current_watts();
        let tokens = self.total_ops / OPS_PER_TOKEN;
        PowerStats {
            current_watts,
            peak_watts: self.peak_watts.max(current_watts),
            total_energy_pj,
            pj_per_token: if tokens > 0.0 {
                total_energy_pj / tokens
            } else {
                0.0
            },
            die_temp_c: AMBIENT_TEMP_C + current_watts * THERMAL_RESISTANCE,
        }
    }

    /// Activities recorded since the last reset
    #[must_use]
    pub fn activities(&self) -> u64 {
        self.activities
    }

    /// Active operating point
    #[must_use]
    pub fn mode(&self) -> EnergyMode {
        self.mode
    }

    /// Change the operating point; already recorded work is re-priced
    pub fn set_mode(&mut self, mode: EnergyMode) {
        self.mode = mode;
    }

    /// Forget all recorded activity, keep the mode
    pub fn reset(&mut self) {
        *self = Self::new(self.mode);
    }
}

impl Default for PowerModel {
    fn default() -> Self {
        Self::new(EnergyMode::default())
    }
}
