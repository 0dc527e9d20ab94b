//! sparsim CLI - sparsity-aware NPU accelerator simulator
//!
//! # Commands
//!
//! - `bench` - Simulate FFN token generation
//! - `verify` - Check kernel accuracy against the scalar reference
//! - `gguf-make` - Write a placeholder GGUF header
//! - `gguf-inspect` - Print a GGUF header
//! - `report-config` - Print the default configuration
//!
//! Set `RUST_LOG=sparsim=debug` to trace individual kernel calls.

use clap::Parser;
use sparsim::{cli, error::Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sparsim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    cli::entrypoint(cli::Cli::parse())
}
