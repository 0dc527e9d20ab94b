//! Command-line surface
//!
//! Parsed by `main.rs` and dispatched through [`super::entrypoint`].

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// sparsim - sparsity-aware NPU accelerator simulator
///
/// Estimates FFN throughput, cache and compression behavior of a
/// sparsity-skipping matrix unit.
#[derive(Parser, Debug)]
#[command(name = "sparsim")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Simulate FFN token generation and print throughput and telemetry
    ///
    /// Examples:
    ///   sparsim bench
    ///   sparsim bench --sparsity 0.6 --tokens 500
    ///   sparsim bench --dense --json
    ///   sparsim bench --fused
    Bench {
        /// Model (hidden) dimension
        #[arg(long, default_value = "4096")]
        dim: i64,

        /// FFN intermediate dimension
        #[arg(long, default_value = "11008")]
        hidden: i64,

        /// Tokens to simulate (one FFN pass each)
        #[arg(short = 'n', long, default_value = "100")]
        tokens: usize,

        /// Assumed activation sparsity in [0, 1]
        #[arg(short, long, default_value = "0.5")]
        sparsity: f32,

        /// Run the dense accuracy path instead of the skip path
        #[arg(long)]
        dense: bool,

        /// Run each token's projections as one fused kernel chain
        #[arg(long)]
        fused: bool,

        /// Randomization seed (overrides the configuration)
        #[arg(long)]
        seed: Option<u64>,

        /// Engine configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print a JSON summary instead of the text report
        #[arg(long)]
        json: bool,
    },
    /// Check the engine's dense path against the scalar reference
    Verify {
        /// Rows of A
        #[arg(long, default_value = "64")]
        m: i64,

        /// Columns of B
        #[arg(long, default_value = "32")]
        n: i64,

        /// Inner dimension
        #[arg(long, default_value = "512")]
        k: i64,

        /// Relative tolerance
        #[arg(long, default_value = "1e-4")]
        tolerance: f32,

        /// Randomization seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Write a placeholder GGUF header file
    GgufMake {
        /// Output path
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Tensor count to record
        #[arg(long, default_value = "10")]
        tensors: u64,

        /// Metadata entry count to record
        #[arg(long, default_value = "0")]
        kv: u64,
    },
    /// Print the header of a GGUF file
    GgufInspect {
        /// File to read
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Print the default engine configuration as JSON
    ReportConfig,
}
