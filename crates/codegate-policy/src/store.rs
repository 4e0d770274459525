//! Policy store
//!
//! Immutable, versioned collection of [`PolicyProfile`]s loaded from a TOML
//! table. Built once at startup and shared behind an `Arc`; there is no
//! mutation after construction.
//!
//! ```toml
//! version = "2024.1"
//! deny = ["socket", "builtins.eval"]
//!
//! [profiles.strict]
//! permitted = ["math", "json"]
//!
//! [profiles.relaxed]
//! extends = "strict"
//! permitted = ["pathlib"]
//! ```

use crate::capability::CapabilityId;
use crate::error::PolicyError;
use crate::profile::PolicyProfile;
use codegate_artifact::ProfileName;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Policy table shipped with the crate
pub const DEFAULT_POLICY: &str = include_str!("../policy/default.toml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyTable {
    version: String,
    #[serde(default)]
    deny: Vec<String>,
    #[serde(default)]
    profiles: BTreeMap<String, ProfileTable>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileTable {
    #[serde(default)]
    permitted: Vec<String>,
    #[serde(default)]
    extends: Option<String>,
}

/// Immutable set of profiles sharing one deny list
#[derive(Debug, Clone)]
pub struct PolicyStore {
    version: String,
    denied: Arc<BTreeSet<CapabilityId>>,
    profiles: BTreeMap<ProfileName, Arc<PolicyProfile>>,
    parents: BTreeMap<ProfileName, ProfileName>,
}

impl PolicyStore {
    /// Store built from the shipped default table
    ///
    /// # Errors
    /// Only if the shipped table is malformed.
    pub fn builtin() -> Result<Self, PolicyError> {
        Self::from_toml_str(DEFAULT_POLICY)
    }

    /// Load a policy table from a TOML file
    ///
    /// # Errors
    /// Returns `PolicyError` if the file cannot be read or the table is
    /// invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_toml_str(&text)?;
        info!(path = %path.display(), version = %store.version, "loaded policy table");
        Ok(store)
    }

    /// Build a store from TOML text
    ///
    /// # Errors
    /// Returns `PolicyError` for malformed TOML, invalid identifiers, unknown
    /// or cyclic `extends`, or an empty version.
    pub fn from_toml_str(text: &str) -> Result<Self, PolicyError> {
        let table: PolicyTable = toml::from_str(text)?;
        Self::from_table(table)
    }

    fn from_table(table: PolicyTable) -> Result<Self, PolicyError> {
        if table.version.trim().is_empty() {
            return Err(PolicyError::MissingVersion);
        }

        let denied = Arc::new(parse_identifiers(&table.deny)?);

        let mut parents = BTreeMap::new();
        for (name, profile) in &table.profiles {
            if let Some(parent) = &profile.extends {
                if !table.profiles.contains_key(parent) {
                    return Err(PolicyError::UnknownExtends {
                        profile: name.clone(),
                        parent: parent.clone(),
                    });
                }
                parents.insert(ProfileName::new(name), ProfileName::new(parent));
            }
        }

        let mut profiles = BTreeMap::new();
        for name in table.profiles.keys() {
            let permitted = resolve_permitted(&table.profiles, name)?;
            debug!(profile = %name, permitted = permitted.len(), "resolved profile");
            let name = ProfileName::new(name);
            profiles.insert(
                name.clone(),
                Arc::new(PolicyProfile::new(name, permitted, Arc::clone(&denied))),
            );
        }

        Ok(Self {
            version: table.version,
            denied,
            profiles,
            parents,
        })
    }

    /// Table version string
    #[inline]
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Always-denied identifiers
    #[inline]
    #[must_use]
    pub fn denied(&self) -> &BTreeSet<CapabilityId> {
        &self.denied
    }

    /// Look up a profile by name
    ///
    /// # Errors
    /// Returns `PolicyError::UnknownProfile` if no such profile exists.
    pub fn profile(&self, name: &ProfileName) -> Result<Arc<PolicyProfile>, PolicyError> {
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| PolicyError::UnknownProfile(name.to_string()))
    }

    /// All profiles, ordered by name
    pub fn profiles(&self) -> impl Iterator<Item = &Arc<PolicyProfile>> {
        self.profiles.values()
    }

    /// Profile `name` extends, if any
    #[must_use]
    pub fn parent_of(&self, name: &ProfileName) -> Option<&ProfileName> {
        self.parents.get(name)
    }

    /// Whether `upper` permits everything `lower` permits
    ///
    /// # Errors
    /// Returns `PolicyError::UnknownProfile` if either profile is missing.
    pub fn is_monotonic(&self, lower: &ProfileName, upper: &ProfileName) -> Result<bool, PolicyError> {
        let lower = self.profile(lower)?;
        let upper = self.profile(upper)?;
        Ok(lower.is_subset_of(&upper))
    }

    /// Every `extends` edge whose child does not permit all of its parent
    ///
    /// Empty for any store built by this type; exposed for `policy check`.
    #[must_use]
    pub fn non_monotonic_edges(&self) -> Vec<(ProfileName, ProfileName)> {
        self.parents
            .iter()
            .filter(|(child, parent)| !matches!(self.is_monotonic(parent, child), Ok(true)))
            .map(|(child, parent)| (child.clone(), parent.clone()))
            .collect()
    }
}

fn parse_identifiers(raw: &[String]) -> Result<BTreeSet<CapabilityId>, PolicyError> {
    raw.iter()
        .map(|s| s.parse::<CapabilityId>().map_err(PolicyError::from))
        .collect()
}

/// Union of a profile's own permits and those of its `extends` chain
fn resolve_permitted(
    profiles: &BTreeMap<String, ProfileTable>,
    name: &str,
) -> Result<BTreeSet<CapabilityId>, PolicyError> {
    let mut chain: Vec<&str> = Vec::new();
    let mut permitted = BTreeSet::new();
    let mut current = Some(name);

    while let Some(profile_name) = current {
        if chain.contains(&profile_name) {
            chain.push(profile_name);
            return Err(PolicyError::CyclicExtends(chain.join(" -> ")));
        }
        chain.push(profile_name);

        let profile = profiles
            .get(profile_name)
            .ok_or_else(|| PolicyError::UnknownProfile(profile_name.to_string()))?;
        permitted.extend(parse_identifiers(&profile.permitted)?);
        current = profile.extends.as_deref();
    }

    Ok(permitted)
}
