//! Scoring engine.
//!
//! A pure function from (questions, answers, mark scheme) to a
//! [`ScoreSummary`]. Running it twice on the same input yields identical
//! results; it never consults the clock or any session state.

use serde::{Deserialize, Serialize};

use crate::error::ScoringError;
use crate::model::{AnswerMap, MarkScheme, Question};

/// How a single question was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Correct,
    Incorrect,
    Unattempted,
}

/// Per-question review line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionReview {
    pub question_id: String,
    pub prompt: String,
    /// The option text the user selected, if any.
    pub selected: Option<String>,
    /// Text of the correct option.
    pub correct_answer: String,
    pub outcome: AnswerOutcome,
    /// Worked solution, carried only when the answer was not correct.
    pub solution: Option<String>,
}

/// Result of scoring a set of answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub correct: usize,
    pub incorrect: usize,
    pub unattempted: usize,
    /// `correct × marks − incorrect × penalty`, floored at zero.
    pub total_score: f64,
    /// Share of the maximum score, 0–100, rounded to two decimals.
    pub percentage: f64,
    /// One entry per question, in question order.
    pub review: Vec<QuestionReview>,
}

impl ScoreSummary {
    pub fn question_count(&self) -> usize {
        self.correct + self.incorrect + self.unattempted
    }
}

/// Score `answers` against `questions`.
///
/// Fails if any question does not have exactly one option flagged correct.
pub fn score(
    questions: &[Question],
    answers: &AnswerMap,
    scheme: MarkScheme,
) -> Result<ScoreSummary, ScoringError> {
    let mut correct = 0usize;
    let mut incorrect = 0usize;
    let mut unattempted = 0usize;
    let mut review = Vec::with_capacity(questions.len());

    for question in questions {
        let correct_answer = &question.correct_option()?.text;
        let selected = answers.get(&question.id);

        let outcome = match selected {
            None => AnswerOutcome::Unattempted,
            Some(text) if text == correct_answer => AnswerOutcome::Correct,
            Some(_) => AnswerOutcome::Incorrect,
        };
        match outcome {
            AnswerOutcome::Correct => correct += 1,
            AnswerOutcome::Incorrect => incorrect += 1,
            AnswerOutcome::Unattempted => unattempted += 1,
        }

        review.push(QuestionReview {
            question_id: question.id.clone(),
            prompt: question.prompt.clone(),
            selected: selected.map(str::to_string),
            correct_answer: correct_answer.clone(),
            outcome,
            solution: if outcome == AnswerOutcome::Correct {
                None
            } else {
                question.solution.clone()
            },
        });
    }

    let raw = correct as f64 * scheme.correct_marks - incorrect as f64 * scheme.negative_marks;
    let total_score = raw.max(0.0);

    let max_score = questions.len() as f64 * scheme.correct_marks;
    let percentage = if max_score > 0.0 {
        round2((total_score / max_score * 100.0).max(0.0))
    } else {
        0.0
    };

    Ok(ScoreSummary {
        correct,
        incorrect,
        unattempted,
        total_score,
        percentage,
        review,
    })
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
