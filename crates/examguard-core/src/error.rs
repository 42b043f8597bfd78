//! Error types for the exam engine.
//!
//! Definition errors are raised when test data is loaded, scoring errors when
//! a question breaks the one-correct-option rule at grading time, and session
//! errors when an operation is issued in the wrong phase.

use thiserror::Error;

use crate::model::SessionPhase;

/// A loaded test definition violates one of its invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    /// The test duration must be at least one minute.
    #[error("test duration must be positive")]
    NonPositiveDuration,

    /// A mark value is negative or not a finite number.
    #[error("{field} must be a non-negative number, got {value}")]
    InvalidMarks { field: &'static str, value: f64 },

    /// A question has a problem with its correct-option flags.
    #[error(transparent)]
    Question(#[from] ScoringError),
}

/// Scoring precondition failures.
///
/// These are fatal to the scoring call: a wrong count is worse than no count.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    /// No option of the question is flagged correct.
    #[error("question {question_id} has no option flagged correct")]
    NoCorrectOption { question_id: String },

    /// More than one option of the question is flagged correct.
    #[error("question {question_id} has {count} options flagged correct")]
    MultipleCorrectOptions { question_id: String, count: usize },
}

/// Errors returned by [`crate::session::ExamSession`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation is not valid in the current phase.
    #[error("cannot {operation} while the session is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: SessionPhase,
    },

    /// The question id is not part of the loaded test.
    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    /// The option text is not one of the question's options.
    #[error("question {question_id} has no option {option:?}")]
    UnknownOption { question_id: String, option: String },

    /// The loaded test data is invalid.
    #[error("invalid test definition: {0}")]
    Definition(#[from] DefinitionError),

    /// Grading failed on a scoring precondition.
    #[error("scoring failed: {0}")]
    Scoring(#[from] ScoringError),
}

/// Camera/microphone acquisition failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The user or the OS refused access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The device does not exist or cannot be opened.
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

impl DeviceError {
    /// Returns `true` if retrying after the user changes a permission can help.
    pub fn is_retriable(&self) -> bool {
        matches!(self, DeviceError::PermissionDenied(_))
    }
}
