//! Error types for Codegate Core
//!
//! Infrastructure failures only. Anything wrong with a candidate is a
//! [`ValidationVerdict`](codegate_artifact::ValidationVerdict), never an
//! error.

use crate::state_machine::TaskState;
use codegate_policy::PolicyError;
use codegate_sandbox::SandboxError;
use codegate_structure::ParseError;
use std::path::PathBuf;

/// Boxed error returned by a [`CandidateSource`](crate::CandidateSource)
pub type GeneratorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Grammar or parser failure
    #[error("parser error: {0}")]
    Parse(#[from] ParseError),

    /// Policy table or profile lookup failure
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Sandbox infrastructure failure
    #[error("sandbox error: {0}")]
    Sandbox(#[source] SandboxError),

    /// Upstream generator failed to produce a candidate
    #[error("generator error: {0}")]
    Generator(#[source] GeneratorError),

    /// Illegal controller state transition
    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A batch task panicked or was aborted
    #[error("task join error: {0}")]
    Join(String),

    /// Task was cancelled
    #[error("task cancelled")]
    Cancelled,
}

impl From<SandboxError> for PipelineError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::Cancelled => Self::Cancelled,
            other => Self::Sandbox(other),
        }
    }
}

impl PipelineError {
    /// Check if error is a cancellation
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Controller state machine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// Transition not in the allowed table
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: TaskState,
        /// Requested state
        to: TaskState,
    },

    /// A further attempt would exceed the ceiling
    #[error("attempt ceiling of {max} reached")]
    AttemptsExhausted {
        /// Maximum attempts
        max: u32,
    },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}
