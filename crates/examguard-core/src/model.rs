//! Core data model types for examguard.
//!
//! A [`TestDefinition`] is immutable once loaded; the only mutable state of a
//! session (answers, phase, violations) lives in
//! [`crate::session::ExamSession`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DefinitionError, ScoringError};

/// A timed multiple-choice test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    /// Unique identifier for this test.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Subject area.
    pub topic: String,
    /// Time allowed, in minutes.
    pub duration_minutes: u32,
    /// Declared number of questions.
    pub total_questions: usize,
    /// Marks awarded per correct answer.
    pub correct_marks: f64,
    /// Marks deducted per incorrect answer.
    pub negative_marks: f64,
    /// The questions, in presentation order.
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl TestDefinition {
    /// Time allowed, in seconds.
    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    pub fn mark_scheme(&self) -> MarkScheme {
        MarkScheme {
            correct_marks: self.correct_marks,
            negative_marks: self.negative_marks,
        }
    }

    /// Look up a question by id.
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Verify the definition's invariants.
    ///
    /// Every question must have exactly one option flagged correct, the
    /// duration must be positive and both mark values non-negative.
    pub fn check(&self) -> Result<(), DefinitionError> {
        if self.duration_minutes == 0 {
            return Err(DefinitionError::NonPositiveDuration);
        }
        for (field, value) in [
            ("correct_marks", self.correct_marks),
            ("negative_marks", self.negative_marks),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DefinitionError::InvalidMarks { field, value });
            }
        }
        for question in &self.questions {
            question.correct_option()?;
        }
        Ok(())
    }
}

/// A single question with its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// The question text shown to the user.
    pub prompt: String,
    /// Options in presentation order.
    #[serde(default)]
    pub options: Vec<AnswerOption>,
    /// Worked solution shown in the review.
    #[serde(default)]
    pub solution: Option<String>,
}

impl Question {
    /// The unique option flagged correct.
    pub fn correct_option(&self) -> Result<&AnswerOption, ScoringError> {
        let mut correct = self.options.iter().filter(|o| o.is_correct);
        match (correct.next(), correct.count()) {
            (Some(option), 0) => Ok(option),
            (None, _) => Err(ScoringError::NoCorrectOption {
                question_id: self.id.clone(),
            }),
            (Some(_), rest) => Err(ScoringError::MultipleCorrectOptions {
                question_id: self.id.clone(),
                count: rest + 1,
            }),
        }
    }

    /// Whether `text` is the text of one of this question's options.
    pub fn has_option(&self, text: &str) -> bool {
        self.options.iter().any(|o| o.text == text)
    }
}

/// One selectable answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Marks per correct answer and penalty per incorrect answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkScheme {
    pub correct_marks: f64,
    pub negative_marks: f64,
}

/// Selected option text keyed by question id.
///
/// A question missing from the map is unattempted. Answers can be
/// overwritten but never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerMap(HashMap<String, String>);

impl AnswerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the answer to a question.
    pub fn record(&mut self, question_id: impl Into<String>, option_text: impl Into<String>) {
        self.0.insert(question_id.into(), option_text.into());
    }

    pub fn get(&self, question_id: &str) -> Option<&str> {
        self.0.get(question_id).map(String::as_str)
    }

    pub fn is_attempted(&self, question_id: &str) -> bool {
        self.0.contains_key(question_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AnswerMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = AnswerMap::new();
        for (k, v) in iter {
            map.record(k, v);
        }
        map
    }
}

/// Lifecycle phase of an exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    NotStarted,
    AwaitingPermission,
    Running,
    Graded,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::NotStarted => write!(f, "not started"),
            SessionPhase::AwaitingPermission => write!(f, "awaiting permission"),
            SessionPhase::Running => write!(f, "running"),
            SessionPhase::Graded => write!(f, "graded"),
        }
    }
}
