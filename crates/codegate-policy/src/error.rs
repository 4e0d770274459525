//! Policy error types

use crate::capability::CapabilityError;
use std::path::PathBuf;

/// Errors loading or querying a policy table
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Policy file could not be read
    #[error("failed to read policy file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Policy table is not valid TOML or has the wrong shape
    #[error("invalid policy table: {0}")]
    Toml(#[from] toml::de::Error),

    /// A capability identifier in the table is malformed
    #[error("invalid capability identifier: {0}")]
    InvalidIdentifier(#[from] CapabilityError),

    /// `extends` names a profile that does not exist
    #[error("profile '{profile}' extends unknown profile '{parent}'")]
    UnknownExtends {
        /// Declaring profile
        profile: String,
        /// Missing parent
        parent: String,
    },

    /// `extends` chain loops back on itself
    #[error("cyclic profile inheritance: {0}")]
    CyclicExtends(String),

    /// Requested profile is not in the store
    #[error("unknown policy profile: '{0}'")]
    UnknownProfile(String),

    /// Table declares no version
    #[error("policy table version must not be empty")]
    MissingVersion,
}
