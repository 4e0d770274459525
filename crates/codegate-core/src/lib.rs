//! Codegate Core - Validation Pipeline and Iteration Controller
//!
//! Orchestrates the gatekeeping of machine-generated code:
//! - Structural validation of the parsed candidate
//! - Static capability policy for the requested profile
//! - Sandboxed execution under a resource budget
//! - Bounded retry with feedback to the upstream generator
//!
//! # Example
//!
//! ```rust,no_run
//! use codegate_artifact::{ArtifactKind, CandidateDraft, ProfileName};
//! use codegate_core::{
//!     CandidateSource, Gatekeeper, GatekeeperConfig, GeneratorError, RegenerationRequest,
//!     TaskRequest,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Model;
//!
//! #[async_trait::async_trait]
//! impl CandidateSource for Model {
//!     async fn regenerate(
//!         &self,
//!         request: &RegenerationRequest,
//!     ) -> Result<CandidateDraft, GeneratorError> {
//!         Ok(request.previous.clone())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gatekeeper = Gatekeeper::from_config(&GatekeeperConfig::new(), Arc::new(Model))?;
//! let draft = CandidateDraft::new(
//!     "def solve(x):\n    return x * 2\n",
//!     ArtifactKind::entrypoint("solve"),
//!     ProfileName::strict(),
//! );
//! let report = gatekeeper
//!     .run_task(TaskRequest::new(draft), &CancellationToken::new())
//!     .await?;
//! println!("{:?} after {} attempts", report.disposition, report.attempts());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod batch;
pub mod config;
pub mod controller;
pub mod error;
pub mod pipeline;
pub mod state_machine;

pub use batch::Gatekeeper;
pub use config::{GatekeeperConfig, PolicySettings, SandboxSettings};
pub use controller::{
    CandidateSource, Feedback, IterationController, RegenerationRequest, TaskDisposition,
    TaskReport, TaskRequest, FEEDBACK_DIAGNOSTIC_BYTES,
};
pub use error::{ConfigError, GeneratorError, PipelineError, StateMachineError};
pub use pipeline::ValidationPipeline;
pub use state_machine::{
    allowed_transitions, validate_transition, IterationState, TaskId, TaskState, MAX_ATTEMPTS,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Codegate Core
    pub use crate::{
        CandidateSource, Gatekeeper, GatekeeperConfig, IterationController, PipelineError,
        TaskReport, TaskRequest, ValidationPipeline,
    };
    pub use codegate_artifact::{ArtifactKind, CandidateDraft, ProfileName, ValidationVerdict};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
