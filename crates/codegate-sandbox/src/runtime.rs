//! Sandbox runtime seam
//!
//! The pipeline only talks to a [`SandboxRuntime`]. The process-backed
//! implementation lives in [`crate::process`]; tests substitute recording
//! fakes.

use crate::budget::ResourceBudget;
use crate::error::SandboxError;
use codegate_artifact::{Candidate, ExecutionOutcome};
use tokio_util::sync::CancellationToken;

/// Executes a validated candidate in isolation
///
/// Implementations must leave no state behind between invocations and must
/// terminate the execution when `cancel` fires.
#[async_trait::async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Run `candidate` (or `harness`, with the candidate importable as
    /// `candidate`) under `budget`
    ///
    /// # Errors
    /// Returns `SandboxError` only for infrastructure failures or
    /// cancellation. Faults caused by the candidate are reported through
    /// the returned [`ExecutionOutcome`].
    async fn execute(
        &self,
        candidate: &Candidate,
        harness: Option<&str>,
        budget: &ResourceBudget,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, SandboxError>;
}
