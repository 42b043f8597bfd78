//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SAMPLE_BANK: &str = "../../question-sets/genetics-evolution.json";

fn examguard(home: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("examguard").unwrap();
    // Keep a user-level config from leaking into the tests.
    cmd.env("HOME", home.path())
        .env_remove("EXAMGUARD_SOURCE_URL")
        .env_remove("EXAMGUARD_TOKEN");
    cmd
}

#[test]
fn validate_sample_bank() {
    let home = TempDir::new().unwrap();
    examguard(&home)
        .arg("validate")
        .arg("--questions")
        .arg(SAMPLE_BANK)
        .assert()
        .success()
        .stdout(predicate::str::contains("Genetics and Evolution"))
        .stdout(predicate::str::contains("10 questions"))
        .stdout(predicate::str::contains("Question bank valid"));
}

#[test]
fn validate_reports_warnings() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("dupes.json");
    std::fs::write(
        &path,
        r#"{ "id": "d", "questions": [
  { "id": 1, "description": "A?", "options": [ { "id": 1, "description": "x", "is_correct": true } ] },
  { "id": 1, "description": "B?", "options": [ { "id": 1, "description": "y", "is_correct": true } ] }
] }"#,
    )
    .unwrap();

    examguard(&home)
        .arg("validate")
        .arg("--questions")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("duplicate question ID"))
        .stdout(predicate::str::contains("1 warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    let home = TempDir::new().unwrap();
    examguard(&home)
        .arg("validate")
        .arg("--questions")
        .arg("nonexistent.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    examguard(&dir)
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created examguard.toml"))
        .stdout(predicate::str::contains("Created question-sets/example.json"));

    assert!(dir.path().join("examguard.toml").exists());

    examguard(&dir)
        .current_dir(dir.path())
        .arg("validate")
        .arg("--questions")
        .arg("question-sets/example.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 questions"));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    examguard(&dir)
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    examguard(&dir)
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn take_submit_and_list_results() {
    let home = TempDir::new().unwrap();
    let results = home.path().join("results.json");
    let html = home.path().join("report.html");
    let json = home.path().join("report.json");

    examguard(&home)
        .arg("take")
        .arg("--questions")
        .arg(SAMPLE_BANK)
        .arg("--results")
        .arg(&results)
        .arg("--devices")
        .arg("granted")
        .arg("--html")
        .arg(&html)
        .arg("--json")
        .arg(&json)
        .write_stdin("start\n3\nnext\n1\nstatus\nsubmit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rules:"))
        .stdout(predicate::str::contains("Answered 2 of 10"))
        .stdout(predicate::str::contains("Score Summary"))
        .stdout(predicate::str::contains("Total Score: 3 / 40"))
        .stdout(predicate::str::contains("Percentage:  7.50%"))
        .stdout(predicate::str::contains("Lamarck argued for inheritance"));

    assert!(html.exists());
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(report["reason"], "manual");
    assert_eq!(report["summary"]["unattempted"], 8);

    examguard(&home)
        .arg("results")
        .arg("--results")
        .arg(&results)
        .assert()
        .success()
        .stdout(predicate::str::contains("genetics-evolution"))
        .stdout(predicate::str::contains("7.50%"));

    let output = examguard(&home)
        .arg("results")
        .arg("--results")
        .arg(&results)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["testId"], "genetics-evolution");
    assert_eq!(records[0]["incorrect"], 1);
}

#[test]
fn end_of_input_submits() {
    let home = TempDir::new().unwrap();
    let results = home.path().join("results.json");

    examguard(&home)
        .arg("take")
        .arg("--questions")
        .arg(SAMPLE_BANK)
        .arg("--results")
        .arg(&results)
        .arg("--devices")
        .arg("granted")
        .write_stdin("start\n3\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("End of input; submitting"))
        .stdout(predicate::str::contains("Total Score: 4 / 40"));

    assert!(results.exists());
}

#[test]
fn focus_losses_count_before_the_command_on_their_line() {
    let home = TempDir::new().unwrap();
    let results = home.path().join("results.json");

    examguard(&home)
        .arg("take")
        .arg("--questions")
        .arg(SAMPLE_BANK)
        .arg("--results")
        .arg(&results)
        .arg("--devices")
        .arg("granted")
        .write_stdin("start\n3\n\x1b[O\x1b[I\x1b[O\x1b[I\x1b[Osubmit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Test automatically submitted"))
        .stdout(predicate::str::contains("Test Results (submitted automatically)"))
        .stdout(predicate::str::contains("Total Score: 4 / 40"));
}

#[test]
fn denied_devices_keep_the_test_closed() {
    let home = TempDir::new().unwrap();
    let results = home.path().join("results.json");

    examguard(&home)
        .arg("take")
        .arg("--questions")
        .arg(SAMPLE_BANK)
        .arg("--results")
        .arg(&results)
        .arg("--devices")
        .arg("denied")
        .write_stdin("start\nstart\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Camera and microphone access are required",
        ))
        .stdout(predicate::str::contains("Test not started"))
        .stdout(predicate::str::contains("Score Summary").not());

    assert!(!results.exists());
}

#[test]
fn take_with_missing_bank_fails() {
    let home = TempDir::new().unwrap();
    examguard(&home)
        .arg("take")
        .arg("--questions")
        .arg("missing.json")
        .arg("--devices")
        .arg("granted")
        .write_stdin("start\n")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Error loading questions"))
        .stderr(predicate::str::contains("could not load the test"));
}

#[test]
fn results_when_empty() {
    let home = TempDir::new().unwrap();
    examguard(&home)
        .arg("results")
        .arg("--results")
        .arg(home.path().join("none.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No results yet"));
}
