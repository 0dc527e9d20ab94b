//! Recorded command batches
//!
//! A [`CommandList`] records kernel calls against tensor handles without
//! running them, then replays the whole batch on an [`Engine`]. The list
//! keeps its commands after execution, so one recording can be replayed
//! once per simulated token.
//!
//! A list marked fused models a fused kernel chain: intermediates stay
//! on-chip between its commands, so the power model charges 40% less memory
//! traffic for every call in the batch. Outputs are unaffected.

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::Result;
use crate::gemm::{ExecutionMode, GemmStats};
use crate::store::TensorHandle;

/// One recorded operation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// `C = A * B`
    Gemm {
        /// Left operand
        a: TensorHandle,
        /// Right operand
        b: TensorHandle,
        /// Output
        c: TensorHandle,
        /// Sparsity argument
        sparsity: f32,
        /// Explicit mode; `None` follows the engine's benchmark flag
        mode: Option<ExecutionMode>,
    },
}

/// Ordered batch of commands
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandList {
    commands: Vec<Command>,
    #[serde(default)]
    fused: bool,
}

impl CommandList {
    /// Empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a GEMM that follows the engine's benchmark flag
    pub fn record_gemm(
        &mut self,
        a: TensorHandle,
        b: TensorHandle,
        c: TensorHandle,
        sparsity: f32,
    ) -> &mut Self {
        self.commands.push(Command::Gemm {
            a,
            b,
            c,
            sparsity,
            mode: None,
        });
        self
    }

    /// Record a GEMM with a fixed execution mode
    pub fn record_gemm_with_mode(
        &mut self,
        a: TensorHandle,
        b: TensorHandle,
        c: TensorHandle,
        sparsity: f32,
        mode: ExecutionMode,
    ) -> &mut Self {
        self.commands.push(Command::Gemm {
            a,
            b,
            c,
            sparsity,
            mode: Some(mode),
        });
        self
    }

    /// Run every command in recording order
    ///
    /// # Errors
    ///
    /// Stops at the first failing command and returns its error. Commands
    /// before it have already run; the failing one changed nothing.
    pub fn execute(&self, engine: &mut Engine) -> Result<Vec<GemmStats>> {
        let mut out = Vec::with_capacity(self.commands.len());
        for command in &self.commands {
            let stats = match *command {
                Command::Gemm {
                    a,
                    b,
                    c,
                    sparsity,
                    mode,
                } => {
                    let mode = mode.unwrap_or_else(|| engine.execution_mode());
                    engine.run_gemm(a, b, c, sparsity, mode, self.fused)?
                },
            };
            out.push(stats);
        }
        Ok(out)
    }

    /// Mark the batch as a fused kernel chain
    pub fn set_fused(&mut self, fused: bool) -> &mut Self {
        self.fused = fused;
        self
    }

    /// Whether the batch runs as a fused kernel chain
    #[must_use]
    pub fn is_fused(&self) -> bool {
        self.fused
    }

    /// Drop all recorded commands; the fused flag is kept
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    /// Recorded commands
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of recorded commands
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing is recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
