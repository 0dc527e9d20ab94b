//! CLI command implementations
//!
//! This module contains the logic behind every `sparsim` subcommand,
//! extracted from main.rs for testability. Each command has a pure
//! `run_*` function returning a value and a thin printing wrapper.

// CLI glue code - relaxed lint requirements
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::CommandList;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::{Result, SparsimError};
use crate::gemm::{ExecutionMode, MicroKernel, ScalarKernel};
use crate::gguf::GgufHeader;
use crate::telemetry::TelemetrySnapshot;

pub mod handlers;
pub use handlers::{Cli, Commands};

/// Main CLI entrypoint - dispatches commands to their implementations
pub fn entrypoint(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Bench {
            dim,
            hidden,
            tokens,
            sparsity,
            dense,
            fused,
            seed,
            config,
            json,
        } => {
            let summary = run_bench(&BenchConfig {
                dim,
                hidden,
                tokens,
                sparsity,
                dense,
                fused,
                seed,
                config,
            })?;
            print_bench(&summary, json)
        },
        Commands::Verify {
            m,
            n,
            k,
            tolerance,
            seed,
        } => {
            let report = run_verify(m, n, k, tolerance, seed)?;
            println!("Verification passed");
            println!("  Shape: {m}x{k} * {k}x{n}");
            println!("  Max abs error: {:e}", report.max_abs_error);
            println!("  Max rel error: {:e}", report.max_rel_error);
            Ok(())
        },
        Commands::GgufMake { path, tensors, kv } => {
            let header = make_gguf(&path, tensors, kv)?;
            println!("Wrote {}", path.display());
            print_header(&header);
            Ok(())
        },
        Commands::GgufInspect { path } => {
            let header = GgufHeader::read_from(&path)?;
            println!("{}", path.display());
            print_header(&header);
            Ok(())
        },
        Commands::ReportConfig => {
            println!("{}", EngineConfig::default().to_json()?);
            Ok(())
        },
    }
}

/// Format byte size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

// ============================================================================
// bench
// ============================================================================

/// Parameters of an FFN throughput simulation
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Model dimension
    pub dim: i64,
    /// FFN intermediate dimension
    pub hidden: i64,
    /// Tokens to simulate
    pub tokens: usize,
    /// Activation sparsity
    pub sparsity: f32,
    /// Use the dense accuracy path
    pub dense: bool,
    /// Record each token's projections as a fused batch
    pub fused: bool,
    /// Seed override
    pub seed: Option<u64>,
    /// Configuration file
    pub config: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            dim: 4096,
            hidden: 11008,
            tokens: 100,
            sparsity: 0.5,
            dense: false,
            fused: false,
            seed: None,
            config: None,
        }
    }
}

/// Result of an FFN throughput simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchSummary {
    /// Tokens simulated
    pub tokens: usize,
    /// Kernel calls per token
    pub gemms_per_token: usize,
    /// Bytes held by the weight and activation tensors
    pub tensor_bytes: u64,
    /// Wall-clock seconds spent in the kernel loop
    pub elapsed_secs: f64,
    /// Simulated generation speed
    pub tokens_per_sec: f64,
    /// Engine statistics after the run
    pub telemetry: TelemetrySnapshot,
}

/// Simulate `tokens` FFN passes (up and down projection)
///
/// Each token runs `h = W_up * x` (hidden x dim times dim x 1) followed by
/// `y = W_down * h` (dim x hidden times hidden x 1).
pub fn run_bench(config: &BenchConfig) -> Result<BenchSummary> {
    let mut engine_config = match &config.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = config.seed {
        engine_config = engine_config.with_seed(seed);
    }
    let mut engine = Engine::from_config(engine_config.with_benchmark_mode(!config.dense))?;

    let x = engine.create_tensor(config.dim, 1)?;
    let w_up = engine.create_tensor(config.hidden, config.dim)?;
    let h = engine.create_tensor(config.hidden, 1)?;
    let w_down = engine.create_tensor(config.dim, config.hidden)?;
    let y = engine.create_tensor(config.dim, 1)?;
    for handle in [x, w_up, w_down] {
        engine.randomize_tensor(handle)?;
    }
    let tensor_bytes: u64 = [x, w_up, h, w_down, y]
        .iter()
        .map(|&t| engine.tensor(t).map(|t| t.byte_size() as u64))
        .sum::<Result<u64>>()?;

    let mut list = CommandList::new();
    list.set_fused(config.fused)
        .record_gemm(w_up, x, h, config.sparsity)
        .record_gemm(w_down, h, y, config.sparsity);

    info!(
        dim = config.dim,
        hidden = config.hidden,
        tokens = config.tokens,
        sparsity = config.sparsity,
        fused = config.fused,
        mode = ?engine.execution_mode(),
        "bench started"
    );
    let start = Instant::now();
    for _ in 0..config.tokens {
        list.execute(&mut engine)?;
    }
    let elapsed_secs = start.elapsed().as_secs_f64().max(1e-9);

    let telemetry = engine.snapshot();
    for handle in [x, w_up, h, w_down, y] {
        engine.delete_tensor(handle)?;
    }

    Ok(BenchSummary {
        tokens: config.tokens,
        gemms_per_token: list.len(),
        tensor_bytes,
        elapsed_secs,
        tokens_per_sec: config.tokens as f64 / elapsed_secs,
        telemetry,
    })
}

fn print_bench(summary: &BenchSummary, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(summary).map_err(|e| SparsimError::FormatError {
            reason: e.to_string(),
        })?;
        println!("{text}");
        return Ok(());
    }

    println!("FFN simulation");
    println!("  Tokens: {}", summary.tokens);
    println!("  GEMMs per token: {}", summary.gemms_per_token);
    println!("  Tensor memory: {}", format_size(summary.tensor_bytes));
    println!("  Total time: {:.4} s", summary.elapsed_secs);
    println!("  Generation speed: {:.2} tokens/sec", summary.tokens_per_sec);
    println!();
    println!("{}", summary.telemetry);
    Ok(())
}

// ============================================================================
// verify
// ============================================================================

/// Deviation of the engine's output from the scalar reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifyReport {
    /// Largest absolute difference
    pub max_abs_error: f32,
    /// Largest difference relative to `max(|reference|, 1)`
    pub max_rel_error: f32,
}

/// Run random `m x k` by `k x n` products through the engine's dense and
/// zero-sparsity accelerated paths and compare with [`ScalarKernel`]
///
/// # Errors
///
/// Returns `VerificationFailed` if either path exceeds `tolerance`.
pub fn run_verify(m: i64, n: i64, k: i64, tolerance: f32, seed: u64) -> Result<VerifyReport> {
    let mut engine = Engine::from_config(EngineConfig::default().with_seed(seed))?;
    let a = engine.create_tensor(m, k)?;
    let b = engine.create_tensor(k, n)?;
    let c = engine.create_tensor(m, n)?;
    engine.randomize_tensor(a)?;
    engine.randomize_tensor(b)?;

    let (mu, nu, ku) = (m as usize, n as usize, k as usize);
    let mut reference = vec![0.0f32; mu * nu];
    ScalarKernel.gemm(
        engine.tensor_data(a)?,
        engine.tensor_data(b)?,
        &mut reference,
        mu,
        nu,
        ku,
    );

    let mut report = VerifyReport {
        max_abs_error: 0.0,
        max_rel_error: 0.0,
    };
    for mode in [ExecutionMode::Dense, ExecutionMode::Accelerated] {
        engine.execute_gemm_with_mode(a, b, c, 0.0, mode)?;
        for (&got, &want) in engine.tensor_data(c)?.iter().zip(&reference) {
            let abs = (got - want).abs();
            report.max_abs_error = report.max_abs_error.max(abs);
            report.max_rel_error = report.max_rel_error.max(abs / want.abs().max(1.0));
        }
    }

    if report.max_rel_error > tolerance {
        return Err(SparsimError::VerificationFailed {
            max_rel_error: report.max_rel_error,
            tolerance,
        });
    }
    Ok(report)
}

// ============================================================================
// gguf
// ============================================================================

/// Write a placeholder header with the given counts
pub fn make_gguf(path: &Path, tensors: u64, kv: u64) -> Result<GgufHeader> {
    let header = GgufHeader {
        tensor_count: tensors,
        kv_count: kv,
        ..GgufHeader::dummy()
    };
    header.write_to(path)?;
    Ok(header)
}

fn print_header(header: &GgufHeader) {
    println!("  Format: GGUF v{}", header.version);
    println!("  Tensors: {}", header.tensor_count);
    println!("  Metadata entries: {}", header.kv_count);
}

#[cfg(test)]
mod tests;
