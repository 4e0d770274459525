//! Codegate Structural Validator
//!
//! First stage of the pipeline. Parses candidate Python text with
//! tree-sitter and checks that the structure the declared
//! [`ArtifactKind`](codegate_artifact::ArtifactKind) requires is present.
//!
//! # Rules
//!
//! - Malformed text yields exactly one `syntax` violation at the first
//!   damaged node, and no further checks run
//! - Every unmet requirement is a separate `missing-structure` violation
//! - Empty text is `missing-structure` for every kind
//!
//! # Example
//!
//! ```rust
//! use codegate_artifact::ArtifactKind;
//! use codegate_structure::StructuralValidator;
//!
//! let outcome = StructuralValidator::new()
//!     .validate("def main():\n    pass\n", &ArtifactKind::Script)
//!     .unwrap();
//! // no __main__ guard
//! assert_eq!(outcome.violations().len(), 1);
//! ```

#![warn(unreachable_pub)]

mod error;
mod outline;
mod parser;
mod requirements;
mod validator;

pub use error::ParseError;
pub use outline::{ClassOutline, FunctionOutline, ModuleOutline};
pub use parser::{location_of, visit_preorder, ParsedArtifact, PythonParser, Visit};
pub use requirements::check_requirements;
pub use validator::{StructuralOutcome, StructuralValidator};

/// Re-exported so dependents can walk [`ParsedArtifact`] trees
pub use tree_sitter::Node;
