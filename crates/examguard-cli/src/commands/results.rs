//! The `examguard results` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examguard_core::results::ResultRecord;
use examguard_host::config::load_config_from;
use examguard_host::JsonResultStore;

pub async fn execute(
    results: Option<PathBuf>,
    config_path: Option<PathBuf>,
    test_id: Option<String>,
    all: bool,
    format: String,
) -> Result<()> {
    let path = match results {
        Some(path) => path,
        None => load_config_from(config_path.as_deref())?.results_path,
    };
    let log = JsonResultStore::new(&path).load().await?;

    let mut records: Vec<&ResultRecord> = if all {
        log.results.iter().collect()
    } else {
        log.latest_per_test().into_values().collect()
    };
    if let Some(id) = &test_id {
        records.retain(|r| &r.test_id == id);
    }

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            if records.is_empty() {
                println!("No results yet.");
                return Ok(());
            }
            print_table(&records);
            println!(
                "{} record(s) shown, {} stored in {}",
                records.len(),
                log.len(),
                path.display()
            );
        }
    }

    Ok(())
}

fn print_table(records: &[&ResultRecord]) {
    let mut table = Table::new();
    table.set_header(vec![
        "Test",
        "Score",
        "Percentage",
        "Correct",
        "Incorrect",
        "Unattempted",
        "Taken",
    ]);

    for r in records {
        table.add_row(vec![
            Cell::new(&r.test_id),
            Cell::new(r.score),
            Cell::new(format!("{:.2}%", r.percentage)),
            Cell::new(r.correct),
            Cell::new(r.incorrect),
            Cell::new(r.unattempted),
            Cell::new(
                r.timestamp
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M"),
            ),
        ]);
    }

    println!("{table}");
}
