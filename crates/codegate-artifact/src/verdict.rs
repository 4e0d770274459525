//! Validation verdicts
//!
//! A [`ValidationVerdict`] is the complete outcome of one pipeline pass over
//! one candidate. The iteration controller keeps one per attempt.

use crate::hash::CandidateHash;
use crate::outcome::{ExecutionOutcome, ExecutionStatus};
use crate::violation::{Violation, ViolationKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Parsing and structural requirements
    Structure,
    /// Static capability policy
    Capability,
    /// Sandboxed execution
    Sandbox,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Structure => "structure",
            Self::Capability => "capability",
            Self::Sandbox => "sandbox",
        })
    }
}

/// Final disposition of a single pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Disposition {
    /// All stages cleared
    Pass,
    /// Failed, attempts remain
    RetryableFail,
    /// Failed with no attempts remaining
    Blocked,
}

/// Candidate fault taxonomy
///
/// Every fault is local to one attempt; the controller turns it into
/// retry feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// Unparseable input
    SyntaxFault,
    /// Forbidden or unrecognized capability
    PolicyViolation,
    /// Required structure absent
    MissingStructure,
    /// Runtime fault inside the sandbox
    ExecutionFault,
    /// Wall-clock budget exceeded
    TimeoutFault,
    /// Isolation limits breached
    ResourceFault,
}

impl FaultKind {
    fn from_violation(kind: ViolationKind) -> Self {
        match kind {
            ViolationKind::Syntax => Self::SyntaxFault,
            ViolationKind::ForbiddenCapability => Self::PolicyViolation,
            ViolationKind::MissingStructure => Self::MissingStructure,
        }
    }

    fn from_status(status: ExecutionStatus) -> Option<Self> {
        match status {
            ExecutionStatus::Succeeded => None,
            ExecutionStatus::Failed => Some(Self::ExecutionFault),
            ExecutionStatus::TimedOut => Some(Self::TimeoutFault),
            ExecutionStatus::ResourceExceeded => Some(Self::ResourceFault),
        }
    }
}

/// Terminal result of one full pipeline pass over a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// 1-based attempt number
    pub attempt: u32,
    /// Hash of the validated candidate text
    pub candidate_hash: CandidateHash,
    /// Last stage that ran
    pub stage_reached: Stage,
    /// Violations found (empty if the sandbox stage was reached)
    pub violations: Vec<Violation>,
    /// Present only if the sandbox stage ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ExecutionOutcome>,
    /// Pass / retry / blocked
    pub disposition: Disposition,
    /// Controller remarks (e.g. identical resubmission)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// When the pass finished
    pub evaluated_at: DateTime<Utc>,
}

impl ValidationVerdict {
    /// Verdict for a pass that stopped with violations before the sandbox
    #[must_use]
    pub fn rejected(
        attempt: u32,
        candidate_hash: CandidateHash,
        stage_reached: Stage,
        violations: Vec<Violation>,
    ) -> Self {
        Self {
            attempt,
            candidate_hash,
            stage_reached,
            violations,
            outcome: None,
            disposition: Disposition::RetryableFail,
            notes: Vec::new(),
            evaluated_at: Utc::now(),
        }
    }

    /// Verdict for a pass that reached the sandbox
    #[must_use]
    pub fn executed(attempt: u32, candidate_hash: CandidateHash, outcome: ExecutionOutcome) -> Self {
        let disposition = if outcome.succeeded() {
            Disposition::Pass
        } else {
            Disposition::RetryableFail
        };
        Self {
            attempt,
            candidate_hash,
            stage_reached: Stage::Sandbox,
            violations: Vec::new(),
            outcome: Some(outcome),
            disposition,
            notes: Vec::new(),
            evaluated_at: Utc::now(),
        }
    }

    /// Force the disposition to blocked (attempt budget exhausted)
    #[inline]
    #[must_use]
    pub fn blocked(mut self) -> Self {
        self.disposition = Disposition::Blocked;
        self
    }

    /// Attach a controller note
    #[inline]
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Whether this pass cleared every stage
    #[inline]
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.disposition == Disposition::Pass
    }

    /// Primary fault of a failed pass
    #[must_use]
    pub fn fault(&self) -> Option<FaultKind> {
        if let Some(first) = self.violations.first() {
            return Some(FaultKind::from_violation(first.kind));
        }
        self.outcome
            .as_ref()
            .and_then(|o| FaultKind::from_status(o.status))
    }

    /// Violations of the given kind
    pub fn violations_of(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::SourceLocation;
    use std::time::Duration;

    fn hash() -> CandidateHash {
        CandidateHash::of_text("x")
    }

    #[test]
    fn rejected_verdict_is_retryable() {
        let v = ValidationVerdict::rejected(
            1,
            hash(),
            Stage::Capability,
            vec![Violation::forbidden_capability(
                "socket",
                "import of 'socket' is always denied",
                SourceLocation::new(1, 1),
            )],
        );
        assert_eq!(v.disposition, Disposition::RetryableFail);
        assert_eq!(v.fault(), Some(FaultKind::PolicyViolation));
        assert!(v.outcome.is_none());
    }

    #[test]
    fn executed_success_is_pass() {
        let outcome = ExecutionOutcome::new(ExecutionStatus::Succeeded, "", Duration::ZERO);
        let v = ValidationVerdict::executed(2, hash(), outcome);
        assert!(v.is_pass());
        assert_eq!(v.fault(), None);
        assert_eq!(v.stage_reached, Stage::Sandbox);
    }

    #[test]
    fn executed_timeout_maps_to_timeout_fault() {
        let outcome = ExecutionOutcome::new(ExecutionStatus::TimedOut, "", Duration::from_secs(5));
        let v = ValidationVerdict::executed(1, hash(), outcome).blocked();
        assert_eq!(v.disposition, Disposition::Blocked);
        assert_eq!(v.fault(), Some(FaultKind::TimeoutFault));
    }

    #[test]
    fn stage_ordering_matches_pipeline() {
        assert!(Stage::Structure < Stage::Capability);
        assert!(Stage::Capability < Stage::Sandbox);
    }
}
