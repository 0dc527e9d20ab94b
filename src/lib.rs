//! # sparsim
//!
//! Simulator for a neural-processing-unit accelerator that exploits
//! activation sparsity in the feed-forward matrix multiplications of large
//! language models.
//!
//! sparsim estimates the tokens/second, cache hit rate, compression ratio
//! and power draw of a sparsity-skipping matrix unit without hardware. It
//! runs real `f32` products on the host and models the accelerator's memory
//! system statistically.
//!
//! ## Features
//!
//! - **Handle-based tensor store**: generational handles; double release
//!   and use-after-release are reported, never undefined
//! - **Sparsity-aware GEMM**: dense blocked kernel plus a skip path that
//!   drops `round(sparsity * K)` accumulation terms per output column
//! - **Telemetry**: simulated L1/L2 hit rates, value-aware compression,
//!   MAC accounting and a power/thermal model
//! - **Benchmark-mode gating**: one flag switches every subsequent call
//!   between the accuracy path and the accelerated path
//!
//! ## Example
//!
//! ```rust
//! use sparsim::Engine;
//!
//! let mut engine = Engine::new();
//! let x = engine.create_tensor(4096, 1).unwrap();
//! let w = engine.create_tensor(64, 4096).unwrap();
//! let out = engine.create_tensor(64, 1).unwrap();
//! engine.randomize_tensor(x).unwrap();
//! engine.randomize_tensor(w).unwrap();
//!
//! engine.set_benchmark_mode(true);
//! for _ in 0..10 {
//!     engine.execute_gemm(w, x, out, 0.5).unwrap();
//! }
//!
//! assert!(engine.l1_hit_rate() > 0.0 && engine.l1_hit_rate() <= 1.0);
//! assert!(engine.compression_ratio() > 1.0);
//! println!("{}", engine.report());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! store (tensors) --> gemm (kernel) --> cache / compression / power
//!                                            |
//!                       engine  <------------+-----> telemetry (report)
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
// Clippy allows (MUST come after deny/warn to override them)
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_wrap)] // usize -> i64 for reported dimensions
#![allow(clippy::cast_precision_loss)] // u64 counters -> f64 ratios is acceptable
#![allow(clippy::cast_possible_truncation)] // f64 -> u64 after rounding is intended
#![allow(clippy::cast_sign_loss)] // rounded non-negative products
#![allow(clippy::must_use_candidate)] // Not all methods need #[must_use]
#![allow(clippy::doc_markdown)] // Allow technical terms without backticks
#![allow(clippy::float_cmp)] // Allow float comparisons in tests
#![allow(clippy::many_single_char_names)] // m, n, k are the GEMM dimensions

/// Simulated L1/L2 cache model
pub mod cache;
/// CLI command implementations (extracted for testability)
pub mod cli;
/// Recorded command batches
pub mod command;
/// Compression-ratio estimator
pub mod compression;
/// Engine configuration (JSON-loadable)
pub mod config;
/// The simulated accelerator and its shared wrapper
pub mod engine;
pub mod error;
/// Sparsity-aware GEMM kernels
pub mod gemm;
/// GGUF stub header
pub mod gguf;
/// Power, energy and thermal model
pub mod power;
/// Block-level sparsity profiling
pub mod sparsity;
/// Tensor store with generational handles
pub mod store;
/// Telemetry aggregation and report rendering
pub mod telemetry;
pub mod tensor;

pub use command::CommandList;
pub use config::{CompressionMode, EnergyMode, EngineConfig, SkipPolicy};
pub use engine::{Engine, SharedEngine};
pub use error::{Result, SparsimError};
pub use gemm::{ExecutionMode, GemmStats};
pub use gguf::GgufHeader;
pub use store::TensorHandle;
pub use telemetry::TelemetrySnapshot;
pub use tensor::Tensor;
