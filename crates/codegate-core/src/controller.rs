//! Iteration controller
//!
//! Drives one task through the pipeline, asking the [`CandidateSource`] for a
//! regenerated candidate after each retryable failure, until a candidate
//! passes or [`MAX_ATTEMPTS`] attempts are spent.
//!
//! # Invariants
//!
//! - At most [`MAX_ATTEMPTS`] attempts per task; the verdict of the last
//!   failed attempt is always `blocked`.
//! - A candidate identical to an earlier attempt is never re-validated. The
//!   attempt is consumed and recorded with the earlier findings.
//! - Generator and sandbox infrastructure errors end the task as
//!   [`PipelineError`], never as a candidate failure.

use crate::error::{GeneratorError, PipelineError};
use crate::pipeline::ValidationPipeline;
use crate::state_machine::{IterationState, TaskId, TaskState, MAX_ATTEMPTS};
use codegate_artifact::{
    Candidate, CandidateDraft, CandidateHash, Disposition, ExecutionStatus, FaultKind,
    ProfileName, ValidationVerdict, Violation,
};
use codegate_sandbox::ResourceBudget;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

/// Diagnostics forwarded to the generator are cut to this many trailing bytes
pub const FEEDBACK_DIAGNOSTIC_BYTES: usize = 4 * 1024;

/// What went wrong with the previous attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Attempt the feedback describes
    pub attempt: u32,
    /// Primary fault
    pub fault: Option<FaultKind>,
    /// Violations with messages and locations
    pub violations: Vec<Violation>,
    /// Sandbox status, if the sandbox ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,
    /// Tail of the captured output, if the sandbox ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
    /// Controller remarks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl Feedback {
    /// Feedback for a failed verdict
    #[must_use]
    pub fn from_verdict(verdict: &ValidationVerdict) -> Self {
        Self {
            attempt: verdict.attempt,
            fault: verdict.fault(),
            violations: verdict.violations.clone(),
            status: verdict.outcome.as_ref().map(|o| o.status),
            diagnostics: verdict
                .outcome
                .as_ref()
                .map(|o| trim_diagnostics(&o.diagnostics, FEEDBACK_DIAGNOSTIC_BYTES)),
            notes: verdict.notes.clone(),
        }
    }
}

/// Keep the last `max` bytes (tracebacks end with the useful part)
fn trim_diagnostics(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

/// Request for a new candidate after a failed attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegenerationRequest {
    /// Task being retried
    pub task_id: TaskId,
    /// Attempt number the new candidate will get
    pub next_attempt: u32,
    /// Draft that failed
    pub previous: CandidateDraft,
    /// Why it failed
    pub feedback: Feedback,
}

/// Upstream generator
///
/// Opaque and untrusted: whatever it returns goes through the full pipeline.
#[async_trait::async_trait]
pub trait CandidateSource: Send + Sync {
    /// Produce a regenerated candidate
    ///
    /// # Errors
    /// Any error ends the task with `PipelineError::Generator`.
    async fn regenerate(
        &self,
        request: &RegenerationRequest,
    ) -> Result<CandidateDraft, GeneratorError>;
}

/// One unit of work for the controller
///
/// The profile is fixed for the whole task: a regenerated draft asking for
/// a different profile is validated under this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// First candidate
    pub draft: CandidateDraft,
    /// Profile every attempt is validated against
    pub profile: ProfileName,
    /// Optional test harness run in place of the candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harness: Option<String>,
    /// Resource budget for this task; the pipeline default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<ResourceBudget>,
}

impl TaskRequest {
    /// Task under the draft's profile, with no harness
    #[must_use]
    pub fn new(draft: CandidateDraft) -> Self {
        Self {
            profile: draft.profile.clone(),
            draft,
            harness: None,
            budget: None,
        }
    }

    /// With test harness
    #[must_use]
    pub fn with_harness(mut self, harness: impl Into<String>) -> Self {
        self.harness = Some(harness.into());
        self
    }

    /// With a task-specific resource budget
    #[must_use]
    pub fn with_budget(mut self, budget: ResourceBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    /// With the profile pinned to `profile`
    #[must_use]
    pub fn with_profile(mut self, profile: ProfileName) -> Self {
        self.profile = profile;
        self
    }
}

/// Terminal task disposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDisposition {
    /// A candidate cleared every stage
    Passed,
    /// Attempts exhausted
    Blocked,
}

/// Final result of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Task identifier
    pub task_id: TaskId,
    /// Passed or blocked
    pub disposition: TaskDisposition,
    /// One verdict per attempt, oldest first
    pub verdicts: Vec<ValidationVerdict>,
}

impl TaskReport {
    /// Whether the task passed
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.disposition == TaskDisposition::Passed
    }

    /// Number of attempts consumed
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.verdicts.len()
    }

    /// Verdict of the last attempt
    #[inline]
    #[must_use]
    pub fn final_verdict(&self) -> Option<&ValidationVerdict> {
        self.verdicts.last()
    }
}

/// Drives tasks through the pipeline with bounded retries
#[derive(Clone)]
pub struct IterationController {
    pipeline: Arc<ValidationPipeline>,
    source: Arc<dyn CandidateSource>,
}

impl std::fmt::Debug for IterationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterationController")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl IterationController {
    /// Create controller
    #[must_use]
    pub fn new(pipeline: Arc<ValidationPipeline>, source: Arc<dyn CandidateSource>) -> Self {
        Self { pipeline, source }
    }

    /// Pipeline in use
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &Arc<ValidationPipeline> {
        &self.pipeline
    }

    /// Run a task to a terminal disposition
    ///
    /// # Errors
    /// Returns `PipelineError` on infrastructure failure or cancellation.
    pub async fn run(
        &self,
        request: TaskRequest,
        cancel: &CancellationToken,
    ) -> Result<TaskReport, PipelineError> {
        let task_id = TaskId::new();
        let span = info_span!("task", %task_id, kind = %request.draft.artifact_kind);
        self.drive(task_id, request, cancel).instrument(span).await
    }

    async fn drive(
        &self,
        task_id: TaskId,
        request: TaskRequest,
        cancel: &CancellationToken,
    ) -> Result<TaskReport, PipelineError> {
        let TaskRequest {
            mut draft,
            profile,
            harness,
            budget,
        } = request;
        let mut state = IterationState::new(task_id);
        info!(%profile, "Task started");

        loop {
            if cancel.is_cancelled() {
                return cancelled(&mut state);
            }
            pin_profile(&mut draft, &profile);
            state.transition(TaskState::Validating)?;
            let attempt = state.attempts();
            let candidate = Candidate::new(draft.clone(), attempt);

            let earlier = state.verdict_for(candidate.hash()).cloned();
            let verdict = match earlier {
                Some(earlier) => repeat_verdict(&earlier, attempt, candidate.hash()),
                None => {
                    let span = info_span!("attempt", attempt, hash = %candidate.hash().short());
                    match self
                        .pipeline
                        .run_with_budget(&candidate, harness.as_deref(), budget.as_ref(), cancel)
                        .instrument(span)
                        .await
                    {
                        Ok(verdict) => verdict,
                        Err(PipelineError::Cancelled) => return cancelled(&mut state),
                        Err(err) => {
                            tracing::error!(attempt, error = %err, "Pipeline infrastructure failure");
                            return Err(err);
                        }
                    }
                }
            };

            if verdict.is_pass() {
                state.transition(TaskState::Passed)?;
                state.record(verdict);
                info!(attempt, "Task passed");
                return Ok(report(state, TaskDisposition::Passed));
            }

            if state.on_last_attempt() {
                state.transition(TaskState::Blocked)?;
                state.record(verdict.blocked());
                warn!(attempts = attempt, "Task blocked after exhausting attempts");
                return Ok(report(state, TaskDisposition::Blocked));
            }

            state.transition(TaskState::RetryableFailed)?;
            warn!(
                attempt,
                max_attempts = MAX_ATTEMPTS,
                fault = ?verdict.fault(),
                "Attempt failed, requesting regeneration"
            );
            let regeneration = RegenerationRequest {
                task_id,
                next_attempt: attempt + 1,
                previous: draft,
                feedback: Feedback::from_verdict(&verdict),
            };
            state.record(verdict);

            draft = tokio::select! {
                result = self.source.regenerate(&regeneration) => {
                    result.map_err(|err| {
                        tracing::error!(error = %err, "Generator failed");
                        PipelineError::Generator(err)
                    })?
                }
                () = cancel.cancelled() => return cancelled(&mut state),
            };
        }
    }
}

/// Hold a draft to the task's profile
fn pin_profile(draft: &mut CandidateDraft, profile: &ProfileName) {
    if &draft.profile != profile {
        warn!(
            requested = %draft.profile,
            pinned = %profile,
            "Draft asked for a different profile; keeping the task's"
        );
        draft.profile = profile.clone();
    }
}

/// Record an identical resubmission without re-validating it
fn repeat_verdict(
    earlier: &ValidationVerdict,
    attempt: u32,
    hash: CandidateHash,
) -> ValidationVerdict {
    warn!(
        attempt,
        earlier_attempt = earlier.attempt,
        "Identical candidate resubmitted; reusing earlier findings"
    );
    let mut verdict = earlier.clone();
    verdict.attempt = attempt;
    verdict.candidate_hash = hash;
    verdict.disposition = Disposition::RetryableFail;
    verdict.evaluated_at = Utc::now();
    verdict.with_note(format!(
        "identical to attempt {}; not re-validated",
        earlier.attempt
    ))
}

fn cancelled(state: &mut IterationState) -> Result<TaskReport, PipelineError> {
    state.transition(TaskState::Cancelled)?;
    info!(attempts = state.attempts(), "Task cancelled");
    Err(PipelineError::Cancelled)
}

fn report(state: IterationState, disposition: TaskDisposition) -> TaskReport {
    TaskReport {
        task_id: state.task_id(),
        disposition,
        verdicts: state.into_history(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegate_artifact::{ExecutionOutcome, SourceLocation, Stage};
    use std::time::Duration;

    #[test]
    fn short_diagnostics_are_kept() {
        assert_eq!(trim_diagnostics("boom", 16), "boom");
    }

    #[test]
    fn long_diagnostics_keep_the_tail() {
        let text = format!("{}Error: last line", "x".repeat(100));
        let trimmed = trim_diagnostics(&text, 16);
        assert_eq!(trimmed, "...Error: last line");
    }

    #[test]
    fn tail_respects_char_boundaries() {
        let trimmed = trim_diagnostics("ééééé", 3);
        assert_eq!(trimmed, "...é");
    }

    #[test]
    fn feedback_from_sandbox_failure() {
        let outcome = ExecutionOutcome::new(
            ExecutionStatus::Failed,
            "ZeroDivisionError",
            Duration::from_millis(5),
        )
        .with_exit_code(1);
        let verdict = ValidationVerdict::executed(2, CandidateHash::of_text("x"), outcome);
        let feedback = Feedback::from_verdict(&verdict);
        assert_eq!(feedback.attempt, 2);
        assert_eq!(feedback.fault, Some(FaultKind::ExecutionFault));
        assert_eq!(feedback.status, Some(ExecutionStatus::Failed));
        assert_eq!(feedback.diagnostics.as_deref(), Some("ZeroDivisionError"));
    }

    #[test]
    fn repeat_carries_findings_and_note() {
        let earlier = ValidationVerdict::rejected(
            1,
            CandidateHash::of_text("import socket"),
            Stage::Capability,
            vec![Violation::forbidden_capability(
                "socket",
                "'socket' is always denied",
                SourceLocation::new(1, 8),
            )],
        );
        let repeat = repeat_verdict(&earlier, 2, earlier.candidate_hash);
        assert_eq!(repeat.attempt, 2);
        assert_eq!(repeat.violations, earlier.violations);
        assert_eq!(repeat.stage_reached, Stage::Capability);
        assert_eq!(repeat.notes, vec!["identical to attempt 1; not re-validated"]);
    }

    #[test]
    fn profile_is_pinned_to_the_task() {
        let mut draft = CandidateDraft::new(
            "import pathlib\n",
            codegate_artifact::ArtifactKind::Library,
            ProfileName::relaxed(),
        );
        pin_profile(&mut draft, &ProfileName::strict());
        assert_eq!(draft.profile, ProfileName::strict());
    }

    #[test]
    fn task_request_takes_profile_from_draft() {
        let draft = CandidateDraft::new(
            "x = 1\n",
            codegate_artifact::ArtifactKind::Library,
            ProfileName::relaxed(),
        );
        let request = TaskRequest::new(draft).with_budget(ResourceBudget::new().with_timeout_secs(2));
        assert_eq!(request.profile, ProfileName::relaxed());
        assert_eq!(request.budget.map(|b| b.timeout_secs), Some(2));
    }

    #[test]
    fn report_serializes_disposition() {
        let report = TaskReport {
            task_id: TaskId::new(),
            disposition: TaskDisposition::Blocked,
            verdicts: Vec::new(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["disposition"], "blocked");
        assert!(!report.passed());
    }
}
