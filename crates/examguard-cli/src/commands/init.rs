//! The `examguard init` command.

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    if std::path::Path::new("examguard.toml").exists() {
        println!("examguard.toml already exists, skipping.");
    } else {
        std::fs::write("examguard.toml", SAMPLE_CONFIG).context("failed to write examguard.toml")?;
        println!("Created examguard.toml");
    }

    std::fs::create_dir_all("question-sets")?;
    let example_path = std::path::Path::new("question-sets/example.json");
    if example_path.exists() {
        println!("question-sets/example.json already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUESTIONS)
            .context("failed to write question-sets/example.json")?;
        println!("Created question-sets/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Edit examguard.toml to point at your question bank");
    println!("  2. Run: examguard validate --questions question-sets/example.json");
    println!("  3. Run: examguard take");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examguard configuration

results_path = "./examguard-results/results.json"

# local: open /dev/video* and a capture device under /dev/snd
# granted / denied: simulate the permission answer
devices = "local"

# Focus losses allowed before the test is submitted automatically
violation_limit = 3

# Seconds a notification stays visible
notification_secs = 3

[source]
type = "file"
path = "question-sets/example.json"

# Or fetch the question bank over HTTP:
# [source]
# type = "http"
# url = "https://exams.example.com/tests/genetics.json"
# bearer_token = "${EXAMGUARD_TOKEN}"
# timeout_secs = 30
"#;

const EXAMPLE_QUESTIONS: &str = r#"{
  "id": "example",
  "title": "Example Test",
  "topic": "General Science",
  "duration": 5,
  "questions_count": 3,
  "correct_answer_marks": 4,
  "negative_marks": 1,
  "questions": [
    {
      "id": 1,
      "description": "Which gas do plants absorb for photosynthesis?",
      "options": [
        { "id": 1, "description": "Oxygen", "is_correct": false },
        { "id": 2, "description": "Carbon dioxide", "is_correct": true },
        { "id": 3, "description": "Nitrogen", "is_correct": false },
        { "id": 4, "description": "Hydrogen", "is_correct": false }
      ],
      "detailed_solution": "Plants take in carbon dioxide and release oxygen during photosynthesis."
    },
    {
      "id": 2,
      "description": "What is the boiling point of water at sea level?",
      "options": [
        { "id": 1, "description": "90 °C", "is_correct": false },
        { "id": 2, "description": "100 °C", "is_correct": true },
        { "id": 3, "description": "110 °C", "is_correct": false },
        { "id": 4, "description": "120 °C", "is_correct": false }
      ],
      "detailed_solution": "At 1 atm, pure water boils at 100 °C."
    },
    {
      "id": 3,
      "description": "Which planet is closest to the Sun?",
      "options": [
        { "id": 1, "description": "Venus", "is_correct": false },
        { "id": 2, "description": "Earth", "is_correct": false },
        { "id": 3, "description": "Mercury", "is_correct": true },
        { "id": 4, "description": "Mars", "is_correct": false }
      ],
      "detailed_solution": "Mercury orbits at about 0.39 AU from the Sun."
    }
  ]
}
"#;
