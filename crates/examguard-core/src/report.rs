//! Session report with JSON persistence and a plain-text rendering.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::TestDefinition;
use crate::results::ResultRecord;
use crate::scoring::{AnswerOutcome, ScoreSummary};
use crate::session::{ExamSession, SubmitReason};

/// The results page of one graded session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub test: TestInfo,
    pub reason: SubmitReason,
    pub started_at: Option<DateTime<Utc>>,
    pub summary: ScoreSummary,
    pub record: ResultRecord,
    /// Whether the record reached durable storage.
    pub persisted: bool,
}

/// Test information shown alongside the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestInfo {
    pub id: String,
    pub title: String,
    pub topic: String,
    pub duration_minutes: u32,
    pub total_questions: usize,
    pub correct_marks: f64,
    pub negative_marks: f64,
}

impl TestInfo {
    pub fn from_definition(test: &TestDefinition) -> Self {
        Self {
            id: test.id.clone(),
            title: test.title.clone(),
            topic: test.topic.clone(),
            duration_minutes: test.duration_minutes,
            total_questions: test.questions.len(),
            correct_marks: test.correct_marks,
            negative_marks: test.negative_marks,
        }
    }

    /// Highest score attainable on this test.
    pub fn max_score(&self) -> f64 {
        self.total_questions as f64 * self.correct_marks
    }
}

impl SessionReport {
    /// Build the report of a graded session; `None` until the session is graded.
    pub fn from_session(session: &ExamSession) -> Option<Self> {
        let outcome = session.outcome()?;
        let test = session.definition()?;
        Some(Self {
            session_id: session.id(),
            test: TestInfo::from_definition(test),
            reason: outcome.reason,
            started_at: session.started_at(),
            summary: outcome.summary.clone(),
            record: outcome.record.clone(),
            persisted: outcome.persisted,
        })
    }

    /// Render the results page as plain text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let s = &self.summary;

        out.push_str(&format!("Test Results ({})\n\n", self.reason));
        out.push_str("Score Summary\n");
        out.push_str(&format!(
            "  Total Score: {} / {}\n",
            s.total_score,
            self.test.max_score()
        ));
        out.push_str(&format!("  Percentage:  {:.2}%\n", s.percentage));
        out.push_str(&format!("  Correct:     {}\n", s.correct));
        out.push_str(&format!("  Incorrect:   {}\n", s.incorrect));
        out.push_str(&format!("  Unattempted: {}\n\n", s.unattempted));

        out.push_str("Test Information\n");
        out.push_str(&format!("  Title:    {}\n", self.test.title));
        out.push_str(&format!("  Topic:    {}\n", self.test.topic));
        out.push_str(&format!(
            "  Duration: {} minutes\n",
            self.test.duration_minutes
        ));
        out.push_str(&format!(
            "  Marking:  +{} correct, -{} incorrect\n\n",
            self.test.correct_marks, self.test.negative_marks
        ));

        out.push_str("Detailed Analysis\n");
        for (i, review) in s.review.iter().enumerate() {
            let mark = match review.outcome {
                AnswerOutcome::Correct => "correct",
                AnswerOutcome::Incorrect => "incorrect",
                AnswerOutcome::Unattempted => "not attempted",
            };
            out.push_str(&format!("\n  Q{}. {} [{mark}]\n", i + 1, review.prompt));
            out.push_str(&format!(
                "      Your answer:    {}\n",
                review.selected.as_deref().unwrap_or("Not attempted")
            ));
            out.push_str(&format!(
                "      Correct answer: {}\n",
                review.correct_answer
            ));
            if let Some(solution) = &review.solution {
                out.push_str(&format!("      Solution: {solution}\n"));
            }
        }

        if !self.persisted {
            out.push_str("\nNote: this result could not be saved.\n");
        }
        out
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse report JSON")
    }
}
