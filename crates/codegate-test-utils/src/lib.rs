//! Testing utilities for the codegate workspace
//!
//! Shared fakes and fixtures: a scripted generator, a recording sandbox and
//! sample candidates.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use codegate_artifact::{
    ArtifactKind, Candidate, CandidateDraft, CandidateHash, ExecutionOutcome, ExecutionStatus,
    ProfileName,
};
use codegate_core::{
    CandidateSource, GeneratorError, IterationController, RegenerationRequest, ValidationPipeline,
};
use codegate_policy::PolicyStore;
use codegate_sandbox::{ResourceBudget, SandboxError, SandboxRuntime};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub mod samples {
    //! Candidate texts for the common scenarios

    /// Entrypoint `solve(x)` that passes under `strict`
    pub const CLEAN_ENTRYPOINT: &str = "def solve(x):\n    return x * 2\n";

    /// Entrypoint using a permitted module
    pub const MATH_ENTRYPOINT: &str = "import math\n\ndef solve(x):\n    return math.sqrt(x)\n";

    /// Imports an always-denied network module
    pub const NETWORK_IMPORT: &str =
        "import socket\n\ndef solve(x):\n    return socket.gethostname()\n";

    /// Calls `eval` on its input
    pub const EVAL_CALL: &str = "def solve(x):\n    return eval(x)\n";

    /// Well-formed but has no `solve`
    pub const MISSING_ENTRYPOINT: &str = "def helper(x):\n    return x\n";

    /// Missing colon after the signature
    pub const SYNTAX_ERROR: &str = "def solve(x)\n    return x\n";

    /// Runnable script with guard
    pub const SCRIPT: &str =
        "def main():\n    print('hello')\n\nif __name__ == \"__main__\":\n    main()\n";

    /// Relaxed-only import
    pub const PATHLIB_ENTRYPOINT: &str =
        "from pathlib import Path\n\ndef solve(x):\n    return Path(x).name\n";
}

/// Draft under the `strict` profile
pub fn draft(text: &str, kind: ArtifactKind) -> CandidateDraft {
    CandidateDraft::new(text, kind, ProfileName::strict())
}

/// `solve` entrypoint draft under the `strict` profile
pub fn solve_draft(text: &str) -> CandidateDraft {
    draft(text, ArtifactKind::entrypoint("solve"))
}

/// Candidate at the given attempt
pub fn candidate(text: &str, kind: ArtifactKind, attempt: u32) -> Candidate {
    Candidate::new(draft(text, kind), attempt)
}

/// Built-in policy store
pub fn builtin_store() -> Arc<PolicyStore> {
    Arc::new(PolicyStore::builtin().expect("built-in policy table loads"))
}

/// Pipeline over the built-in store and the given sandbox
pub fn pipeline(sandbox: Arc<dyn SandboxRuntime>) -> ValidationPipeline {
    ValidationPipeline::new(builtin_store(), sandbox)
}

/// Controller over the built-in store
pub fn controller(
    sandbox: Arc<dyn SandboxRuntime>,
    source: Arc<dyn CandidateSource>,
) -> IterationController {
    IterationController::new(Arc::new(pipeline(sandbox)), source)
}

/// Sandbox outcome with the given status
pub fn outcome(status: ExecutionStatus, diagnostics: &str) -> ExecutionOutcome {
    let outcome = ExecutionOutcome::new(status, diagnostics, Duration::from_millis(10));
    match status {
        ExecutionStatus::Succeeded => outcome.with_exit_code(0),
        ExecutionStatus::Failed => outcome.with_exit_code(1),
        ExecutionStatus::TimedOut | ExecutionStatus::ResourceExceeded => outcome,
    }
}

/// What the recording sandbox does on one call
#[derive(Debug, Clone)]
pub enum SandboxStep {
    /// Return this outcome
    Outcome(ExecutionOutcome),
    /// Fail with an infrastructure error
    Unavailable,
    /// Block until cancelled
    Hang,
}

/// One recorded sandbox call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxCall {
    pub attempt: u32,
    pub hash: CandidateHash,
    pub harness: Option<String>,
    pub budget: ResourceBudget,
}

/// Sandbox fake that records every call and replays scripted steps
///
/// Once the script is exhausted every call succeeds.
#[derive(Debug, Default)]
pub struct RecordingSandbox {
    steps: Mutex<VecDeque<SandboxStep>>,
    calls: Mutex<Vec<SandboxCall>>,
}

impl RecordingSandbox {
    /// Sandbox where every call succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Sandbox replaying `steps` in order
    pub fn scripted(steps: impl IntoIterator<Item = SandboxStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sandbox replaying outcomes with the given statuses
    pub fn with_statuses(statuses: impl IntoIterator<Item = ExecutionStatus>) -> Self {
        Self::scripted(
            statuses
                .into_iter()
                .map(|status| SandboxStep::Outcome(outcome(status, status.as_str()))),
        )
    }

    /// Calls seen so far
    pub fn calls(&self) -> Vec<SandboxCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls seen so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl SandboxRuntime for RecordingSandbox {
    async fn execute(
        &self,
        candidate: &Candidate,
        harness: Option<&str>,
        budget: &ResourceBudget,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, SandboxError> {
        self.calls.lock().unwrap().push(SandboxCall {
            attempt: candidate.attempt(),
            hash: candidate.hash(),
            harness: harness.map(ToString::to_string),
            budget: *budget,
        });
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            None => Ok(outcome(ExecutionStatus::Succeeded, "")),
            Some(SandboxStep::Outcome(outcome)) => Ok(outcome),
            Some(SandboxStep::Unavailable) => Err(SandboxError::Spawn {
                interpreter: "python3".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
            Some(SandboxStep::Hang) => {
                cancel.cancelled().await;
                Err(SandboxError::Cancelled)
            }
        }
    }
}

/// Generator fake that hands out scripted drafts and records requests
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    drafts: Mutex<VecDeque<CandidateDraft>>,
    requests: Mutex<Vec<RegenerationRequest>>,
    failure: Option<String>,
}

impl ScriptedGenerator {
    /// Generator returning `drafts` in order, then resubmitting the previous one
    pub fn new(drafts: impl IntoIterator<Item = CandidateDraft>) -> Self {
        Self {
            drafts: Mutex::new(drafts.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Generator that always resubmits the previous draft unchanged
    pub fn repeating() -> Self {
        Self::default()
    }

    /// Generator that always fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<RegenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CandidateSource for ScriptedGenerator {
    async fn regenerate(
        &self,
        request: &RegenerationRequest,
    ) -> Result<CandidateDraft, GeneratorError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(message) = &self.failure {
            return Err(message.clone().into());
        }
        let next = self.drafts.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| request.previous.clone()))
    }
}
