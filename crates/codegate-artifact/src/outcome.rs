//! Sandboxed execution outcomes

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

/// Terminal status of one sandbox invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStatus {
    /// Clean completion under budget
    Succeeded,
    /// Uncaught fault or nonzero exit
    Failed,
    /// Wall-clock budget exceeded; execution was killed
    TimedOut,
    /// Memory ceiling (or another isolation limit) breached
    ResourceExceeded,
}

impl ExecutionStatus {
    /// Kebab-case label
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed-out",
            Self::ResourceExceeded => "resource-exceeded",
        }
    }
}

impl Display for ExecutionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one sandboxed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Terminal status
    pub status: ExecutionStatus,
    /// Captured stdout/stderr, capped
    pub diagnostics: String,
    /// Process exit code, when the process exited normally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl ExecutionOutcome {
    /// Outcome with the given status and no exit code
    #[must_use]
    pub fn new(status: ExecutionStatus, diagnostics: impl Into<String>, duration: Duration) -> Self {
        Self {
            status,
            diagnostics: diagnostics.into(),
            exit_code: None,
            duration,
        }
    }

    /// Attach the process exit code
    #[inline]
    #[must_use]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Whether the run completed cleanly
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_builder() {
        let outcome = ExecutionOutcome::new(
            ExecutionStatus::Failed,
            "Traceback ...",
            Duration::from_millis(40),
        )
        .with_exit_code(1);
        assert!(!outcome.succeeded());
        assert_eq!(outcome.exit_code, Some(1));
    }

    #[test]
    fn status_labels() {
        assert_eq!(ExecutionStatus::TimedOut.to_string(), "timed-out");
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::ResourceExceeded).unwrap(),
            "\"resource-exceeded\""
        );
    }
}
