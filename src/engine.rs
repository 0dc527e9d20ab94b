//! The simulated accelerator
//!
//! An [`Engine`] owns everything a benchmark run touches: the tensor store,
//! the benchmark-mode flag, and the cache, compression, power and work
//! counters. Statistics aggregate across every call until
//! [`Engine::reset_cache`] is invoked; dropping the engine discards them.
//!
//! ## Call flow of [`Engine::execute_gemm`]
//!
//! ```text
//! validate sparsity + handles + shapes   (no state touched on failure)
//!        |
//! pick ExecutionMode from the benchmark flag
//!        |
//! run kernel into a scratch buffer, copy into C
//!        |
//! cache.record -> compression.record -> power.record -> work.record
//! ```
//!
//! ## Example
//!
//! ```
//! use sparsim::Engine;
//!
//! let mut engine = Engine::new();
//! let a = engine.create_tensor(4, 4).unwrap();
//! let b = engine.create_tensor(4, 4).unwrap();
//! let c = engine.create_tensor(4, 4).unwrap();
//! engine.randomize_tensor(a).unwrap();
//! engine.randomize_tensor(b).unwrap();
//!
//! engine.execute_gemm(a, b, c, 0.5).unwrap();
//! assert!(engine.l1_hit_rate() > 0.0);
//! assert!(engine.compression_ratio() >= 1.0);
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::cache::{AccessPattern, CacheSimulator};
use crate::compression::CompressionEstimator;
use crate::config::{EnergyMode, EngineConfig};
use crate::error::Result;
use crate::gemm::{self, ExecutionMode, GemmShape, GemmStats, KernelParams};
use crate::power::PowerModel;
use crate::sparsity::SparsityMask;
use crate::store::{TensorHandle, TensorStore};
use crate::telemetry::{TelemetrySnapshot, WorkCounters};
use crate::tensor::Tensor;

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Simulated sparsity-aware NPU
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    params: KernelParams,
    store: TensorStore,
    benchmark_mode: bool,
    cache: CacheSimulator,
    compression: CompressionEstimator,
    power: PowerModel,
    work: WorkCounters,
}

impl Engine {
    /// Engine with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::build(EngineConfig::default())
    }

    /// Engine with an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `config` fails validation.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Engine configured from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `Load` if the file is missing or malformed,
    /// `InvalidConfiguration` if a value is out of range.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = EngineConfig::from_json_file(path)?;
        info!(path = %path.display(), "engine configuration loaded");
        Self::from_config(config)
    }

    fn build(config: EngineConfig) -> Self {
        Self {
            params: KernelParams {
                tiling: config.tiling,
                skip_policy: config.skip_policy,
                parallel_threshold: config.parallel_threshold,
            },
            store: TensorStore::new(config.seed),
            benchmark_mode: config.benchmark_mode,
            cache: CacheSimulator::new(config.cache),
            compression: CompressionEstimator::new(config.compression, config.zero_cost_divisor),
            power: PowerModel::new(config.energy_mode),
            work: WorkCounters::default(),
            config,
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Tensor store
    // ------------------------------------------------------------------

    /// Allocate a zero-filled `rows x cols` tensor
    ///
    /// # Errors
    ///
    /// Returns `InvalidDimension` if either dimension is `<= 0`.
    pub fn create_tensor(&mut self, rows: i64, cols: i64) -> Result<TensorHandle> {
        self.store.create(rows, cols)
    }

    /// Release a tensor
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for unknown or already-released handles.
    pub fn delete_tensor(&mut self, handle: TensorHandle) -> Result<()> {
        self.store.release(handle)
    }

    /// Fill a tensor with seeded uniform values in `[-1, 1)`
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for unknown or released handles.
    pub fn randomize_tensor(&mut self, handle: TensorHandle) -> Result<()> {
        self.store.randomize(handle)
    }

    /// Restart the randomization sequence from `seed`
    pub fn reseed(&mut self, seed: u64) {
        self.store.reseed(seed);
    }

    /// Borrow a tensor
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for unknown or released handles.
    pub fn tensor(&self, handle: TensorHandle) -> Result<&Tensor> {
        self.store.get(handle)
    }

    /// Row-major contents of a tensor
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for unknown or released handles.
    pub fn tensor_data(&self, handle: TensorHandle) -> Result<&[f32]> {
        Ok(self.store.get(handle)?.data())
    }

    /// Mutable row-major contents of a tensor
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for unknown or released handles.
    pub fn tensor_data_mut(&mut self, handle: TensorHandle) -> Result<&mut [f32]> {
        Ok(self.store.get_mut(handle)?.data_mut())
    }

    /// Number of live tensors
    #[must_use]
    pub fn live_tensors(&self) -> usize {
        self.store.len()
    }

    /// Measure block and element sparsity of a tensor
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` for a bad handle, `InvalidConfiguration` for
    /// a zero block size.
    pub fn profile_tensor(
        &self,
        handle: TensorHandle,
        block_rows: usize,
        block_cols: usize,
    ) -> Result<SparsityMask> {
        SparsityMask::generate(self.store.get(handle)?, block_rows, block_cols)
    }

    // ------------------------------------------------------------------
    // Kernel
    // ------------------------------------------------------------------

    /// `C = A * B` in the mode selected by the benchmark flag
    ///
    /// In benchmark mode `round(sparsity * K)` accumulation terms per output
    /// column are skipped. In accuracy mode the full product is computed and
    /// `sparsity` only feeds the telemetry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSparsity`, `InvalidHandle` or `DimensionMismatch`.
    /// On error neither C nor any statistic is modified.
    pub fn execute_gemm(
        &mut self,
        a: TensorHandle,
        b: TensorHandle,
        c: TensorHandle,
        sparsity: f32,
    ) -> Result<GemmStats> {
        let mode = self.execution_mode();
        self.execute_gemm_with_mode(a, b, c, sparsity, mode)
    }

    /// `C = A * B` with an explicit execution mode, ignoring the flag
    ///
    /// # Errors
    ///
    /// Same as [`execute_gemm`](Self::execute_gemm).
    pub fn execute_gemm_with_mode(
        &mut self,
        a: TensorHandle,
        b: TensorHandle,
        c: TensorHandle,
        sparsity: f32,
        mode: ExecutionMode,
    ) -> Result<GemmStats> {
        self.run_gemm(a, b, c, sparsity, mode, false)
    }

    /// Shared kernel path; `fused` marks a call whose operands stay on-chip
    /// within a fused batch, which discounts its memory traffic.
    pub(crate) fn run_gemm(
        &mut self,
        a: TensorHandle,
        b: TensorHandle,
        c: TensorHandle,
        sparsity: f32,
        mode: ExecutionMode,
        fused: bool,
    ) -> Result<GemmStats> {
        gemm::check_sparsity(sparsity)?;
        let ta = self.store.get(a)?;
        let tb = self.store.get(b)?;
        let c_shape = self.store.get(c)?.shape();
        let shape = GemmShape::from_operands(ta.shape(), tb.shape(), c_shape)?;

        let mut out = vec![0.0f32; shape.m * shape.n];
        let stats = gemm::execute(
            ta.data(),
            tb.data(),
            &mut out,
            shape,
            mode,
            sparsity,
            &self.params,
        )?;
        self.store.get_mut(c)?.data_mut().copy_from_slice(&out);

        let call = self.cache.record(AccessPattern {
            a,
            b,
            accesses: shape.micro_tiles(&self.params.tiling),
            sparsity,
        });
        let weights = (shape.m * shape.k) as u64;
        self.compression.record(weights, F32_BYTES, sparsity);

        let bytes = ((shape.m * shape.k + shape.k * shape.n + shape.m * shape.n) * F32_BYTES) as u64;
        let skipped_share = 1.0 - stats.work_fraction() as f32;
        self.power
            .record_activity(2 * shape.dense_macs(), bytes, skipped_share, fused);
        self.work.record(&stats);

        debug!(
            %a, %b, %c,
            m = shape.m, n = shape.n, k = shape.k,
            ?mode,
            sparsity,
            fused,
            reused = call.reused,
            hits = call.hits,
            misses = call.misses,
            macs = stats.macs_performed,
            "gemm executed"
        );
        Ok(stats)
    }

    // ------------------------------------------------------------------
    // Mode control
    // ------------------------------------------------------------------

    /// Turn the sparsity-skipping path on or off for subsequent calls
    pub fn set_benchmark_mode(&mut self, enabled: bool) {
        if self.benchmark_mode != enabled {
            info!(enabled, "benchmark mode changed");
        }
        self.benchmark_mode = enabled;
    }

    /// Current benchmark-mode flag
    #[must_use]
    pub fn benchmark_mode(&self) -> bool {
        self.benchmark_mode
    }

    /// Mode the next [`execute_gemm`](Self::execute_gemm) will use
    #[must_use]
    pub fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::from_benchmark_flag(self.benchmark_mode)
    }

    /// Change the power model's operating point
    pub fn set_energy_mode(&mut self, mode: EnergyMode) {
        info!(?mode, "energy mode changed");
        self.power.set_mode(mode);
    }

    // ------------------------------------------------------------------
    // Telemetry
    // ------------------------------------------------------------------

    /// Zero every statistic; the benchmark flag and tensors are kept
    pub fn reset_cache(&mut self) {
        self.cache.reset();
        self.compression.reset();
        self.power.reset();
        self.work = WorkCounters::default();
        info!("statistics reset");
    }

    /// Simulated L1 hit rate in `[0, 1]`, 0.0 before any call
    #[must_use]
    pub fn l1_hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }

    /// Simulated compression ratio, `>= 1`, 1.0 before any call
    #[must_use]
    pub fn compression_ratio(&self) -> f64 {
        self.compression.ratio()
    }

    /// Cumulative kernel work
    #[must_use]
    pub fn work(&self) -> WorkCounters {
        self.work
    }

    /// Freeze all statistics
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            benchmark_mode: self.benchmark_mode,
            work: self.work,
            cache: self.cache.counters(),
            l1_hit_rate: self.cache.hit_rate(),
            l2_hit_rate: self.cache.l2_hit_rate(),
            compression_mode: self.compression.mode(),
            compression: self.compression.counters(),
            compression_ratio: self.compression.ratio(),
            observed_sparsity: self.compression.observed_sparsity(),
            energy_mode: self.power.mode(),
            power: self.power.stats(),
            live_tensors: self.store.len() as u64,
        }
    }

    /// Human-readable report
    #[must_use]
    pub fn report(&self) -> String {
        self.snapshot().to_string()
    }

    /// Write the report to stdout
    pub fn print_report(&self) {
        println!("{}", self.report());
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// An [`Engine`] shared between threads
///
/// Every operation takes the lock for its whole duration, so kernel calls
/// from different threads are serialized.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    /// Wrap an engine
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Lock the engine
    ///
    /// # Panics
    ///
    /// Panics if a previous holder panicked while holding the lock.
    pub fn lock(&self) -> MutexGuard<'_, Engine> {
        self.inner.lock().expect("engine mutex poisoned")
    }

    /// Run `f` with exclusive access to the engine
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        f(&mut self.lock())
    }
}

impl From<Engine> for SharedEngine {
    fn from(engine: Engine) -> Self {
        Self::new(engine)
    }
}
