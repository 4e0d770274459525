//! Single-pass validation pipeline
//!
//! Runs structure, capability and sandbox stages in order over one
//! candidate and stops at the first stage that finds anything. The sandbox
//! is reached only by candidates with no violations at all.

use crate::error::PipelineError;
use codegate_artifact::{Candidate, Stage, ValidationVerdict};
use codegate_policy::{CapabilityPolicyEngine, PolicyStore};
use codegate_sandbox::{ResourceBudget, SandboxRuntime};
use codegate_structure::{StructuralOutcome, StructuralValidator};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Ordered three-stage pipeline
#[derive(Clone)]
pub struct ValidationPipeline {
    validator: StructuralValidator,
    engine: CapabilityPolicyEngine,
    policy: Arc<PolicyStore>,
    sandbox: Arc<dyn SandboxRuntime>,
    budget: ResourceBudget,
}

impl std::fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("policy_version", &self.policy.version())
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl ValidationPipeline {
    /// Create pipeline over a policy store and sandbox
    #[must_use]
    pub fn new(policy: Arc<PolicyStore>, sandbox: Arc<dyn SandboxRuntime>) -> Self {
        Self {
            validator: StructuralValidator::new(),
            engine: CapabilityPolicyEngine::new(),
            policy,
            sandbox,
            budget: ResourceBudget::default(),
        }
    }

    /// With default budget for the sandbox stage
    #[inline]
    #[must_use]
    pub fn with_budget(mut self, budget: ResourceBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Policy store in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &Arc<PolicyStore> {
        &self.policy
    }

    /// Default sandbox budget
    #[inline]
    #[must_use]
    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    /// Run one pass over `candidate`
    ///
    /// `harness`, when given, is what the sandbox executes, with the
    /// candidate importable as `candidate`.
    ///
    /// # Errors
    /// Returns `PipelineError` for infrastructure failures (grammar, unknown
    /// profile, sandbox construction) and for cancellation. Candidate faults
    /// are reported in the verdict.
    pub async fn run(
        &self,
        candidate: &Candidate,
        harness: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ValidationVerdict, PipelineError> {
        self.run_with_budget(candidate, harness, None, cancel).await
    }

    /// Run one pass with a per-invocation budget
    ///
    /// `budget` overrides the pipeline default for the sandbox stage.
    ///
    /// # Errors
    /// As [`ValidationPipeline::run`].
    pub async fn run_with_budget(
        &self,
        candidate: &Candidate,
        harness: Option<&str>,
        budget: Option<&ResourceBudget>,
        cancel: &CancellationToken,
    ) -> Result<ValidationVerdict, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let attempt = candidate.attempt();
        let hash = candidate.hash();

        let parsed = match self
            .validator
            .validate(candidate.text(), candidate.artifact_kind())?
        {
            StructuralOutcome::Accepted(parsed) => parsed,
            StructuralOutcome::Rejected(violations) => {
                info!(
                    stage = %Stage::Structure,
                    violations = violations.len(),
                    "Candidate rejected"
                );
                return Ok(ValidationVerdict::rejected(
                    attempt,
                    hash,
                    Stage::Structure,
                    violations,
                ));
            }
        };
        debug!(kind = %candidate.artifact_kind(), "Structure accepted");

        let profile = self.policy.profile(candidate.profile())?;
        let violations = self.engine.evaluate(&parsed, &profile);
        drop(parsed);
        if !violations.is_empty() {
            info!(
                stage = %Stage::Capability,
                profile = %profile.name(),
                policy_version = self.policy.version(),
                violations = violations.len(),
                "Candidate rejected"
            );
            return Ok(ValidationVerdict::rejected(
                attempt,
                hash,
                Stage::Capability,
                violations,
            ));
        }
        debug!(
            profile = %profile.name(),
            policy_version = self.policy.version(),
            "Capabilities accepted"
        );

        let outcome = self
            .sandbox
            .execute(candidate, harness, budget.unwrap_or(&self.budget), cancel)
            .await?;
        info!(
            stage = %Stage::Sandbox,
            status = %outcome.status,
            duration_ms = u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX),
            "Sandbox finished"
        );
        Ok(ValidationVerdict::executed(attempt, hash, outcome))
    }
}
