//! Sandbox error types
//!
//! Infrastructure failures only. Anything the candidate does wrong inside
//! the sandbox is an [`ExecutionOutcome`](codegate_artifact::ExecutionOutcome).

use std::path::PathBuf;

/// Errors constructing or driving the sandbox
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Scratch directory could not be created
    #[error("failed to create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    /// A file could not be staged into the scratch directory
    #[error("failed to write {path}: {source}")]
    Stage {
        /// Target file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Interpreter process could not be started
    #[error("failed to spawn interpreter '{interpreter}': {source}")]
    Spawn {
        /// Interpreter path
        interpreter: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Waiting on or signalling the child failed
    #[error("sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Budget cannot be enforced
    #[error("invalid resource budget: {0}")]
    InvalidBudget(String),

    /// Execution was cancelled by the caller
    #[error("sandbox execution cancelled")]
    Cancelled,
}
