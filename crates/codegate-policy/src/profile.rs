//! Policy profiles
//!
//! A profile is one permission tier. All profiles of a store share the same
//! always-denied set, which overrides anything a profile permits.

use crate::capability::CapabilityId;
use codegate_artifact::ProfileName;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Classification of one capability reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Permitted by the profile (via the identifier or an ancestor)
    Allowed {
        /// Permitted entry that matched
        matched: CapabilityId,
    },
    /// Always denied, regardless of profile
    Denied {
        /// Deny-list entry that matched
        matched: CapabilityId,
    },
    /// Neither permitted nor denied; treated as forbidden
    Unknown,
}

impl Classification {
    /// Whether the reference may stand
    #[inline]
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// One permission tier
#[derive(Debug, Clone)]
pub struct PolicyProfile {
    name: ProfileName,
    permitted: BTreeSet<CapabilityId>,
    denied: Arc<BTreeSet<CapabilityId>>,
}

impl PolicyProfile {
    /// Create a profile sharing a deny set
    #[must_use]
    pub fn new(
        name: ProfileName,
        permitted: BTreeSet<CapabilityId>,
        denied: Arc<BTreeSet<CapabilityId>>,
    ) -> Self {
        Self {
            name,
            permitted,
            denied,
        }
    }

    /// Profile name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &ProfileName {
        &self.name
    }

    /// Permitted identifiers
    #[inline]
    #[must_use]
    pub fn permitted(&self) -> &BTreeSet<CapabilityId> {
        &self.permitted
    }

    /// Always-denied identifiers
    #[inline]
    #[must_use]
    pub fn denied(&self) -> &BTreeSet<CapabilityId> {
        &self.denied
    }

    /// Classify an identifier: deny first, then permit, else unknown
    ///
    /// A permitted entry covers the public members beneath it only. Reaching
    /// through an underscore-prefixed member (`random._os`) needs that exact
    /// identifier, or one below the private segment, to be permitted.
    #[must_use]
    pub fn classify(&self, capability: &CapabilityId) -> Classification {
        if let Some(matched) = capability.prefixes().find(|p| self.denied.contains(p)) {
            return Classification::Denied { matched };
        }
        if let Some(matched) = capability
            .prefixes()
            .find(|p| self.permitted.contains(p) && !crosses_private_member(p, capability))
        {
            return Classification::Allowed { matched };
        }
        Classification::Unknown
    }

    /// Whether every identifier this profile permits is also permitted by
    /// `other`
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.permitted
            .iter()
            .all(|cap| cap.prefixes().any(|p| other.permitted.contains(&p)))
    }
}

/// Whether `capability` names an underscore-prefixed member below `granted`
fn crosses_private_member(granted: &CapabilityId, capability: &CapabilityId) -> bool {
    capability.path()[granted.path().len()..]
        .iter()
        .any(|segment| segment.starts_with('_'))
}
