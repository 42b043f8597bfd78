//! Question bank parser.
//!
//! Loads a test definition from the JSON question-bank format and validates
//! it. Numeric fields are accepted either as JSON numbers or as numeric
//! strings; ids may be numbers or strings.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{AnswerOption, Question, TestDefinition};

const DEFAULT_TITLE: &str = "Test";
const DEFAULT_TOPIC: &str = "General";
const DEFAULT_DURATION_MINUTES: u32 = 15;
const DEFAULT_CORRECT_MARKS: f64 = 4.0;
const DEFAULT_NEGATIVE_MARKS: f64 = 1.0;

/// A JSON value that is either a number or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(serde_json::Number),
    Text(String),
}

impl Loose {
    fn into_string(self) -> String {
        match self {
            Loose::Number(n) => n.to_string(),
            Loose::Text(s) => s,
        }
    }

    /// The value as a finite number; `"NaN"`, `"inf"` and the like count as absent.
    fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Loose::Number(n) => n.as_f64(),
            Loose::Text(s) => s.trim().parse().ok(),
        };
        value.filter(|v| v.is_finite())
    }
}

/// Intermediate JSON structure for question bank files.
#[derive(Debug, Deserialize)]
struct JsonTestFile {
    id: Loose,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    duration: Option<Loose>,
    #[serde(default)]
    questions_count: Option<Loose>,
    #[serde(default)]
    correct_answer_marks: Option<Loose>,
    #[serde(default)]
    negative_marks: Option<Loose>,
    questions: Option<Vec<JsonQuestion>>,
}

#[derive(Debug, Deserialize)]
struct JsonQuestion {
    id: Loose,
    #[serde(default)]
    description: String,
    #[serde(default)]
    options: Vec<JsonOption>,
    #[serde(default)]
    detailed_solution: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonOption {
    id: Loose,
    description: String,
    #[serde(default)]
    is_correct: bool,
}

fn non_empty(value: Option<String>, default: &str) -> String {
    value
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn number_or(value: Option<&Loose>, default: f64) -> f64 {
    value.and_then(Loose::as_f64).unwrap_or(default)
}

/// Read and parse a question bank file.
pub fn parse_test_definition(path: &Path) -> Result<TestDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question file: {}", path.display()))?;

    parse_test_definition_str(&content, path)
}

/// Parse question bank JSON (useful for testing).
///
/// Missing fields take their defaults. A missing `questions` array is an
/// error, and so is a definition that fails [`TestDefinition::check`].
pub fn parse_test_definition_str(content: &str, source_path: &Path) -> Result<TestDefinition> {
    let parsed: JsonTestFile = serde_json::from_str(content)
        .with_context(|| format!("failed to parse JSON: {}", source_path.display()))?;

    let Some(raw_questions) = parsed.questions else {
        anyhow::bail!(
            "invalid question data format: {} has no questions array",
            source_path.display()
        );
    };

    let questions: Vec<Question> = raw_questions
        .into_iter()
        .map(|q| Question {
            id: q.id.into_string(),
            prompt: q.description,
            options: q
                .options
                .into_iter()
                .map(|o| AnswerOption {
                    id: o.id.into_string(),
                    text: o.description,
                    is_correct: o.is_correct,
                })
                .collect(),
            solution: q.detailed_solution.filter(|s| !s.trim().is_empty()),
        })
        .collect();

    let duration = number_or(parsed.duration.as_ref(), f64::from(DEFAULT_DURATION_MINUTES));
    let total_questions = parsed
        .questions_count
        .as_ref()
        .and_then(Loose::as_f64)
        .filter(|n| *n >= 1.0)
        .map_or(questions.len(), |n| n as usize);

    let definition = TestDefinition {
        id: parsed.id.into_string(),
        title: non_empty(parsed.title, DEFAULT_TITLE),
        topic: non_empty(parsed.topic, DEFAULT_TOPIC),
        // Fractional minutes are truncated; negative values become zero and fail `check`.
        duration_minutes: duration.clamp(0.0, f64::from(u32::MAX)) as u32,
        total_questions,
        correct_marks: number_or(parsed.correct_answer_marks.as_ref(), DEFAULT_CORRECT_MARKS),
        negative_marks: number_or(parsed.negative_marks.as_ref(), DEFAULT_NEGATIVE_MARKS),
        questions,
    };

    definition
        .check()
        .with_context(|| format!("invalid question data format: {}", source_path.display()))?;

    tracing::debug!(
        test = %definition.id,
        questions = definition.questions.len(),
        "parsed test definition"
    );
    Ok(definition)
}

/// A non-fatal problem found in a test definition.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    pub message: String,
}

/// Look for problems that do not prevent the test from being taken.
pub fn validate_test_definition(test: &TestDefinition) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for question in &test.questions {
        if !seen_ids.insert(question.id.as_str()) {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: format!("duplicate question ID: {}", question.id),
            });
        }
    }

    for question in &test.questions {
        if question.prompt.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(question.id.clone()),
                message: "question text is empty".into(),
            });
        }

        // Answers are matched by text, so two identical options are ambiguous.
        let mut seen_texts = HashSet::new();
        for option in &question.options {
            if !seen_texts.insert(option.text.as_str()) {
                warnings.push(ValidationWarning {
                    question_id: Some(question.id.clone()),
                    message: format!("duplicate option text: {}", option.text),
                });
            }
        }
    }

    if test.total_questions != test.questions.len() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: format!(
                "questions_count is {} but the file contains {} questions",
                test.total_questions,
                test.questions.len()
            ),
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_JSON: &str = r#"{
  "id": 101,
  "title": "Genetics and Evolution",
  "topic": "Biology",
  "duration": "30",
  "questions_count": 2,
  "correct_answer_marks": "4",
  "negative_marks": 1,
  "questions": [
    {
      "id": 1,
      "description": "Which base pairs with adenine in DNA?",
      "options": [
        { "id": 11, "description": "Thymine", "is_correct": true },
        { "id": 12, "description": "Uracil", "is_correct": false }
      ],
      "detailed_solution": "Adenine pairs with thymine through two hydrogen bonds."
    },
    {
      "id": "q2",
      "description": "Who proposed natural selection?",
      "options": [
        { "id": "a", "description": "Lamarck", "is_correct": false },
        { "id": "b", "description": "Darwin", "is_correct": true }
      ]
    }
  ]
}"#;

    fn parse(json: &str) -> Result<TestDefinition> {
        parse_test_definition_str(json, &PathBuf::from("test.json"))
    }

    #[test]
    fn parse_valid_json() {
        let test = parse(VALID_JSON).unwrap();
        assert_eq!(test.id, "101");
        assert_eq!(test.title, "Genetics and Evolution");
        assert_eq!(test.duration_minutes, 30);
        assert_eq!(test.correct_marks, 4.0);
        assert_eq!(test.questions.len(), 2);
        assert_eq!(test.questions[0].id, "1");
        assert_eq!(test.questions[0].options[0].id, "11");
        assert_eq!(test.questions[1].correct_option().unwrap().text, "Darwin");
        assert!(test.questions[1].solution.is_none());
    }

    #[test]
    fn parse_missing_optional_fields() {
        let json = r#"{
  "id": "minimal",
  "questions": [
    { "id": 1, "description": "Pick one", "options": [
      { "id": 1, "description": "yes", "is_correct": true },
      { "id": 2, "description": "no" }
    ] }
  ]
}"#;
        let test = parse(json).unwrap();
        assert_eq!(test.title, "Test");
        assert_eq!(test.topic, "General");
        assert_eq!(test.duration_minutes, 15);
        assert_eq!(test.total_questions, 1);
        assert_eq!(test.correct_marks, 4.0);
        assert_eq!(test.negative_marks, 1.0);
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let json = r#"{ "id": 1, "duration": "soon", "negative_marks": "", "questions": [] }"#;
        let test = parse(json).unwrap();
        assert_eq!(test.duration_minutes, 15);
        assert_eq!(test.negative_marks, 1.0);
        assert_eq!(test.total_questions, 0);
    }

    #[test]
    fn non_finite_numbers_fall_back_to_defaults() {
        let json = r#"{ "id": 1, "duration": "NaN", "correct_answer_marks": "inf",
                        "negative_marks": "-infinity", "questions_count": "NaN", "questions": [
  { "id": 1, "description": "Pick one", "options": [ { "id": 1, "description": "yes", "is_correct": true } ] }
] }"#;
        let test = parse(json).unwrap();
        assert_eq!(test.duration_minutes, 15);
        assert_eq!(test.correct_marks, 4.0);
        assert_eq!(test.negative_marks, 1.0);
        assert_eq!(test.total_questions, 1);
    }

    #[test]
    fn missing_questions_array_is_an_error() {
        let err = parse(r#"{ "id": 1, "title": "Empty" }"#).unwrap_err();
        assert!(format!("{err:#}").contains("invalid question data format"));
    }

    #[test]
    fn definition_without_correct_option_is_rejected() {
        let json = r#"{ "id": 1, "questions": [
  { "id": 1, "description": "?", "options": [ { "id": 1, "description": "a" } ] }
] }"#;
        let err = parse(json).unwrap_err();
        assert!(format!("{err:#}").contains("no option flagged correct"));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let err = parse(r#"{ "id": 1, "duration": 0, "questions": [] }"#).unwrap_err();
        assert!(format!("{err:#}").contains("duration must be positive"));
    }

    #[test]
    fn parse_malformed_json() {
        assert!(parse("{ not json").is_err());
    }

    #[test]
    fn validate_reports_non_fatal_issues() {
        let json = r#"{ "id": 1, "questions_count": 5, "questions": [
  { "id": 1, "description": "", "options": [
    { "id": 1, "description": "same", "is_correct": true },
    { "id": 2, "description": "same" }
  ] },
  { "id": 1, "description": "Again", "options": [
    { "id": 1, "description": "x", "is_correct": true }
  ] }
] }"#;
        let test = parse(json).unwrap();
        let warnings = validate_test_definition(&test);
        let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("duplicate question ID")));
        assert!(messages.iter().any(|m| m.contains("duplicate option text")));
        assert!(messages.iter().any(|m| m.contains("question text is empty")));
        assert!(messages.iter().any(|m| m.contains("questions_count is 5")));
    }

    #[test]
    fn clean_definition_has_no_warnings() {
        let test = parse(VALID_JSON).unwrap();
        assert!(validate_test_definition(&test).is_empty());
    }

    #[test]
    fn parse_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genetics.json");
        std::fs::write(&path, VALID_JSON).unwrap();
        assert_eq!(parse_test_definition(&path).unwrap().id, "101");
        assert!(parse_test_definition(&dir.path().join("missing.json")).is_err());
    }
}
