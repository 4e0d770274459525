//! Codegate Capability Policy
//!
//! Policy store and the static capability stage of the pipeline.
//!
//! - [`PolicyStore`]: immutable, versioned profiles loaded from TOML
//! - [`PolicyProfile`]: one permission tier sharing the always-denied set
//! - [`CapabilityId`]: hierarchical identifier (`os.path`, `builtins.eval`)
//! - [`CapabilityPolicyEngine`]: classifies a candidate's references
//!
//! Classification checks the deny set first, then the profile's permits; an
//! identifier matching neither is forbidden.

#![warn(unreachable_pub)]

mod capability;
mod engine;
mod error;
mod profile;
mod references;
mod store;

pub use capability::{CapabilityError, CapabilityId, CapabilityRoot};
pub use engine::CapabilityPolicyEngine;
pub use error::PolicyError;
pub use profile::{Classification, PolicyProfile};
pub use references::{
    extract_references, BindingId, CapabilityReference, ReferenceOrigin, ReferenceSet,
    RelativeImport, BUILTIN_NAMES, ESCAPE_ATTRIBUTES,
};
pub use store::{PolicyStore, DEFAULT_POLICY};
