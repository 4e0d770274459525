//! Gatekeeper configuration
//!
//! Loaded from TOML. Every section is optional; missing values fall back to
//! [`Default`].
//!
//! ```toml
//! max_concurrent_tasks = 8
//!
//! [sandbox]
//! interpreter = "/usr/bin/python3"
//! interpreter_args = ["-I", "-B"]
//! guard_prelude = true
//!
//! [sandbox.budget]
//! timeout_secs = 5
//! memory_bytes = 268435456
//!
//! [policy]
//! path = "policy.toml"
//! default_profile = "strict"
//! ```

use crate::error::ConfigError;
use codegate_artifact::ProfileName;
use codegate_policy::{PolicyError, PolicyStore};
use codegate_sandbox::{ProcessSandbox, ProcessSandboxConfig, ResourceBudget};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sandbox section
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Interpreter, guard and OS limit settings
    #[serde(flatten)]
    pub process: ProcessSandboxConfig,
    /// Budget applied when a task does not supply its own
    pub budget: ResourceBudget,
}

/// Policy section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Policy table to load instead of the built-in default
    pub path: Option<PathBuf>,
    /// Profile used when a caller does not name one
    pub default_profile: ProfileName,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            path: None,
            default_profile: ProfileName::strict(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Sandbox settings
    pub sandbox: SandboxSettings,
    /// Policy settings
    pub policy: PolicySettings,
    /// Upper bound on concurrently running tasks in a batch
    pub max_concurrent_tasks: usize,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxSettings::default(),
            policy: PolicySettings::default(),
            max_concurrent_tasks: 4,
        }
    }
}

impl GatekeeperConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, does not decode, or
    /// holds out-of-range values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "Loaded gatekeeper config");
        Ok(config)
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns `ConfigError` on decode failure or out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for a zero concurrency bound or an
    /// unenforceable budget.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_tasks must be at least 1".into(),
            ));
        }
        self.sandbox
            .budget
            .validate()
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    /// With concurrency bound
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    /// With default budget
    #[inline]
    #[must_use]
    pub fn with_budget(mut self, budget: ResourceBudget) -> Self {
        self.sandbox.budget = budget;
        self
    }

    /// With sandbox process settings
    #[inline]
    #[must_use]
    pub fn with_sandbox(mut self, process: ProcessSandboxConfig) -> Self {
        self.sandbox.process = process;
        self
    }

    /// With policy table path
    #[inline]
    #[must_use]
    pub fn with_policy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy.path = Some(path.into());
        self
    }

    /// With default profile
    #[inline]
    #[must_use]
    pub fn with_default_profile(mut self, profile: ProfileName) -> Self {
        self.policy.default_profile = profile;
        self
    }

    /// Load the configured policy table, or the built-in one
    ///
    /// # Errors
    /// Returns `PolicyError` if the table cannot be loaded or validated.
    pub fn policy_store(&self) -> Result<PolicyStore, PolicyError> {
        match &self.policy.path {
            Some(path) => PolicyStore::load(path),
            None => PolicyStore::builtin(),
        }
    }

    /// Build the process sandbox
    #[must_use]
    pub fn process_sandbox(&self) -> ProcessSandbox {
        ProcessSandbox::new(self.sandbox.process.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_default() {
        let config = GatekeeperConfig::from_toml_str("").unwrap();
        assert_eq!(config, GatekeeperConfig::default());
        assert_eq!(config.policy.default_profile, ProfileName::strict());
    }

    #[test]
    fn nested_sections() {
        let config = GatekeeperConfig::from_toml_str(
            r#"
max_concurrent_tasks = 8

[sandbox]
interpreter = "/usr/bin/python3"
guard_prelude = false

[sandbox.budget]
timeout_secs = 5

[policy]
default_profile = "relaxed"
"#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent_tasks, 8);
        assert_eq!(config.sandbox.process.interpreter, PathBuf::from("/usr/bin/python3"));
        assert!(!config.sandbox.process.guard_prelude);
        assert_eq!(config.sandbox.budget.timeout_secs, 5);
        assert_eq!(
            config.sandbox.budget.memory_bytes,
            ResourceBudget::default().memory_bytes
        );
        assert_eq!(config.policy.default_profile, ProfileName::relaxed());
    }

    #[test]
    fn zero_concurrency_is_invalid() {
        let err = GatekeeperConfig::from_toml_str("max_concurrent_tasks = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let err =
            GatekeeperConfig::from_toml_str("[sandbox.budget]\ntimeout_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn builtin_policy_without_path() {
        let store = GatekeeperConfig::new().policy_store().unwrap();
        assert!(store.profile(&ProfileName::strict()).is_ok());
    }
}
