//! Resource budgets
//!
//! Per-invocation limits the sandbox enforces. Limits are applied by OS
//! primitives, not checked after the fact; [`ResourceBudget::within_timeout`]
//! classifies what was observed.

use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wall-clock timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default address-space ceiling (512 MiB)
pub const DEFAULT_MEMORY_BYTES: u64 = 512 * 1024 * 1024;
/// Default cap on captured output (64 KiB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Limits for one sandbox invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceBudget {
    /// Wall-clock timeout in seconds
    pub timeout_secs: u64,
    /// Address-space ceiling in bytes
    pub memory_bytes: u64,
    /// Cap on captured stdout + stderr in bytes
    pub max_output_bytes: usize,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            memory_bytes: DEFAULT_MEMORY_BYTES,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ResourceBudget {
    /// Create budget with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set wall-clock timeout
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set memory ceiling
    #[must_use]
    pub fn with_memory_bytes(mut self, bytes: u64) -> Self {
        self.memory_bytes = bytes;
        self
    }

    /// Set output cap
    #[must_use]
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Wall-clock timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// CPU-seconds backstop: one second past the wall-clock timeout
    #[inline]
    #[must_use]
    pub fn cpu_limit_secs(&self) -> u64 {
        self.timeout_secs.saturating_add(1)
    }

    /// Reject budgets that cannot be enforced
    ///
    /// # Errors
    /// Returns `SandboxError::InvalidBudget` for a zero timeout or memory
    /// ceiling.
    pub fn validate(&self) -> Result<(), SandboxError> {
        if self.timeout_secs == 0 {
            return Err(SandboxError::InvalidBudget("timeout must be at least 1s".into()));
        }
        if self.memory_bytes == 0 {
            return Err(SandboxError::InvalidBudget(
                "memory ceiling must be nonzero".into(),
            ));
        }
        Ok(())
    }

    /// Whether an observed run time is within the wall-clock timeout
    #[inline]
    #[must_use]
    pub fn within_timeout(&self, elapsed: Duration) -> bool {
        elapsed <= self.timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let budget = ResourceBudget::default();
        assert_eq!(budget.timeout(), Duration::from_secs(10));
        assert_eq!(budget.max_output_bytes, 64 * 1024);
        assert_eq!(budget.cpu_limit_secs(), 11);
        assert!(budget.validate().is_ok());
    }

    #[test]
    fn zero_limits_are_invalid() {
        assert!(ResourceBudget::new().with_timeout_secs(0).validate().is_err());
        assert!(ResourceBudget::new().with_memory_bytes(0).validate().is_err());
    }

    #[test]
    fn within_timeout_is_inclusive_of_the_limit() {
        let budget = ResourceBudget::new().with_timeout_secs(2);
        assert!(budget.within_timeout(Duration::from_secs(2)));
        assert!(budget.within_timeout(Duration::from_millis(1999)));
        assert!(!budget.within_timeout(Duration::from_secs(3)));
    }

    #[test]
    fn partial_table_uses_defaults() {
        let budget: ResourceBudget = toml::from_str("timeout_secs = 3").unwrap();
        assert_eq!(budget.timeout_secs, 3);
        assert_eq!(budget.memory_bytes, DEFAULT_MEMORY_BYTES);
    }
}
