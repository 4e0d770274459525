//! Iteration state machine
//!
//! ```text
//! Pending -> Validating -> Passed
//!                       -> Blocked
//!                       -> RetryableFailed -> Validating
//! Pending | Validating | RetryableFailed -> Cancelled
//! ```
//!
//! `Passed`, `Blocked` and `Cancelled` are terminal. Entering `Validating`
//! consumes an attempt; the ceiling is [`MAX_ATTEMPTS`].

use crate::error::StateMachineError;
use codegate_artifact::{CandidateHash, ValidationVerdict};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use ulid::Ulid;

/// Attempt ceiling per task
pub const MAX_ATTEMPTS: u32 = 3;

/// Unique task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Ulid);

impl TaskId {
    /// Generate new task ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get inner ULID
    #[inline]
    #[must_use]
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Controller state of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Created, no attempt yet
    Pending,
    /// A candidate is in the pipeline
    Validating,
    /// Last attempt failed and attempts remain
    RetryableFailed,
    /// A candidate cleared every stage
    Passed,
    /// Attempts exhausted
    Blocked,
    /// Cancelled by the caller
    Cancelled,
}

impl TaskState {
    /// Whether no further transitions are possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: TaskState) -> &'static [TaskState] {
    use TaskState::{Blocked, Cancelled, Passed, Pending, RetryableFailed, Validating};
    match from {
        Pending => &[Validating, Cancelled],
        Validating => &[Passed, RetryableFailed, Blocked, Cancelled],
        RetryableFailed => &[Validating, Cancelled],
        Passed | Blocked | Cancelled => &[],
    }
}

/// Validates a state transition
///
/// # Errors
/// Returns `StateMachineError::IllegalTransition` if `to` is not reachable
/// from `from`.
pub fn validate_transition(from: TaskState, to: TaskState) -> Result<(), StateMachineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateMachineError::IllegalTransition { from, to })
    }
}

/// Per-task iteration bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationState {
    task_id: TaskId,
    state: TaskState,
    attempts: u32,
    max_attempts: u32,
    history: Vec<ValidationVerdict>,
}

impl IterationState {
    /// Fresh state in `Pending`
    #[must_use]
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: TaskState::Pending,
            attempts: 0,
            max_attempts: MAX_ATTEMPTS,
            history: Vec::new(),
        }
    }

    /// Task identifier
    #[inline]
    #[must_use]
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Attempts consumed so far
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Attempt ceiling
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether the current attempt is the last one allowed
    #[inline]
    #[must_use]
    pub fn on_last_attempt(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Verdicts recorded so far, oldest first
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[ValidationVerdict] {
        &self.history
    }

    /// Earliest verdict for a candidate with this hash
    #[must_use]
    pub fn verdict_for(&self, hash: CandidateHash) -> Option<&ValidationVerdict> {
        self.history.iter().find(|v| v.candidate_hash == hash)
    }

    /// Move to `to`, validating the transition
    ///
    /// # Errors
    /// Returns `StateMachineError` for an illegal transition, or when entering
    /// `Validating` would exceed the attempt ceiling.
    pub fn transition(&mut self, to: TaskState) -> Result<(), StateMachineError> {
        validate_transition(self.state, to)?;
        if to == TaskState::Validating {
            if self.attempts >= self.max_attempts {
                return Err(StateMachineError::AttemptsExhausted {
                    max: self.max_attempts,
                });
            }
            self.attempts += 1;
        }
        self.state = to;
        Ok(())
    }

    /// Record the verdict of the current attempt
    pub fn record(&mut self, verdict: ValidationVerdict) {
        self.history.push(verdict);
    }

    /// Consume into the verdict history
    #[must_use]
    pub fn into_history(self) -> Vec<ValidationVerdict> {
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut state = IterationState::new(TaskId::new());
        state.transition(TaskState::Validating).unwrap();
        assert_eq!(state.attempts(), 1);
        state.transition(TaskState::Passed).unwrap();
        assert!(state.state().is_terminal());
    }

    #[test]
    fn retry_loop_is_bounded() {
        let mut state = IterationState::new(TaskId::new());
        for _ in 0..MAX_ATTEMPTS - 1 {
            state.transition(TaskState::Validating).unwrap();
            state.transition(TaskState::RetryableFailed).unwrap();
        }
        state.transition(TaskState::Validating).unwrap();
        assert!(state.on_last_attempt());
        state.transition(TaskState::RetryableFailed).unwrap();

        let err = state.transition(TaskState::Validating).unwrap_err();
        assert_eq!(err, StateMachineError::AttemptsExhausted { max: MAX_ATTEMPTS });
        assert_eq!(state.attempts(), MAX_ATTEMPTS);
    }

    #[test]
    fn terminal_states_reject_everything() {
        for terminal in [TaskState::Passed, TaskState::Blocked, TaskState::Cancelled] {
            assert!(terminal.is_terminal());
            assert!(validate_transition(terminal, TaskState::Validating).is_err());
        }
    }

    #[test]
    fn illegal_shortcuts() {
        assert!(validate_transition(TaskState::Pending, TaskState::Passed).is_err());
        assert!(validate_transition(TaskState::RetryableFailed, TaskState::Blocked).is_err());
        assert!(validate_transition(TaskState::Pending, TaskState::Cancelled).is_ok());
        assert!(validate_transition(TaskState::RetryableFailed, TaskState::Cancelled).is_ok());
    }

    #[test]
    fn task_id_is_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }
}
