//! Codegate Artifact Types
//!
//! Value types shared by every stage of the validation pipeline.
//!
//! # Core Concepts
//!
//! - [`Candidate`]: One generated source artifact, immutable once submitted
//! - [`ArtifactKind`]: Declared shape that selects structural requirements
//! - [`Violation`]: A single structural or policy breach
//! - [`ExecutionOutcome`]: Result of one sandboxed run
//! - [`ValidationVerdict`]: Complete outcome of one pipeline pass
//!
//! # Example
//!
//! ```rust
//! use codegate_artifact::{ArtifactKind, Candidate, CandidateDraft, ProfileName};
//!
//! let draft = CandidateDraft::new(
//!     "def solve(x):\n    return x * 2\n",
//!     ArtifactKind::entrypoint("solve"),
//!     ProfileName::strict(),
//! );
//! let candidate = Candidate::new(draft, 1);
//! assert_eq!(candidate.attempt(), 1);
//! ```

#![warn(unreachable_pub)]

mod candidate;
mod hash;
mod outcome;
mod verdict;
mod violation;

pub use candidate::{ArtifactKind, Candidate, CandidateDraft, KindParseError, ProfileName};
pub use hash::{CandidateHash, HashError};
pub use outcome::{ExecutionOutcome, ExecutionStatus};
pub use verdict::{Disposition, FaultKind, Stage, ValidationVerdict};
pub use violation::{SourceLocation, Violation, ViolationKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
