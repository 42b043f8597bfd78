//! The `examguard validate` command.

use std::path::PathBuf;

use anyhow::Result;

use examguard_core::parser::{parse_test_definition, validate_test_definition};

pub fn execute(questions_path: PathBuf) -> Result<()> {
    let test = parse_test_definition(&questions_path)?;

    println!(
        "Test: {} ({} questions, {} minutes, +{}/-{})",
        test.title,
        test.questions.len(),
        test.duration_minutes,
        test.correct_marks,
        test.negative_marks
    );

    let warnings = validate_test_definition(&test);
    for w in &warnings {
        let prefix = w
            .question_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Question bank valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
