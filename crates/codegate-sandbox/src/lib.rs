//! Codegate Sandbox
//!
//! Isolated execution of candidates that cleared static validation.
//!
//! # Isolation
//!
//! Every invocation of [`ProcessSandbox`]:
//! - runs in a fresh scratch directory that is deleted afterwards
//! - starts from a cleared environment (no inherited credentials)
//! - carries OS limits on CPU time, address space, open files and processes
//! - is killed when the wall-clock budget or the cancellation token fires
//! - runs through the guard prelude, which blocks network access, process
//!   creation, native code loading and writes outside the scratch directory
//!
//! # Example
//!
//! ```rust,no_run
//! use codegate_artifact::{ArtifactKind, Candidate, CandidateDraft, ProfileName};
//! use codegate_sandbox::{ProcessSandbox, ResourceBudget, SandboxRuntime};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), codegate_sandbox::SandboxError> {
//! let candidate = Candidate::new(
//!     CandidateDraft::new("print('hi')\n", ArtifactKind::Library, ProfileName::strict()),
//!     1,
//! );
//! let outcome = ProcessSandbox::default()
//!     .execute(&candidate, None, &ResourceBudget::default(), &CancellationToken::new())
//!     .await?;
//! println!("{}", outcome.status);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

mod budget;
mod error;
mod guard;
mod limits;
mod output;
mod process;
mod runtime;

pub use budget::{
    ResourceBudget, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_MEMORY_BYTES, DEFAULT_TIMEOUT_SECS,
};
pub use error::SandboxError;
pub use guard::{BLOCKED_EXIT_CODE, GUARD_FILE, GUARD_PRELUDE, MEMORY_EXIT_CODE};
#[cfg(unix)]
pub use limits::apply_rlimits;
pub use limits::ChildLimits;
pub use output::TRUNCATION_MARKER;
pub use process::{ProcessSandbox, ProcessSandboxConfig, CANDIDATE_FILE, HARNESS_FILE};
pub use runtime::SandboxRuntime;
