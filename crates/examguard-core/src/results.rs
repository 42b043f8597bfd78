//! Result records and the stored result log.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::TestDefinition;
use crate::scoring::ScoreSummary;

/// Key under which the result log is kept in a key-value store.
pub const RESULTS_KEY: &str = "testResults";

/// Immutable summary of one graded session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub test_id: String,
    /// Total score, floored at zero.
    pub score: f64,
    pub percentage: f64,
    pub correct: usize,
    pub incorrect: usize,
    pub unattempted: usize,
    pub timestamp: DateTime<Utc>,
}

impl ResultRecord {
    pub fn new(test: &TestDefinition, summary: &ScoreSummary, timestamp: DateTime<Utc>) -> Self {
        Self {
            test_id: test.id.clone(),
            score: summary.total_score,
            percentage: summary.percentage,
            correct: summary.correct,
            incorrect: summary.incorrect,
            unattempted: summary.unattempted,
            timestamp,
        }
    }
}

/// The stored list of results, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultLog {
    #[serde(default)]
    pub results: Vec<ResultRecord>,
}

impl ResultLog {
    pub fn push(&mut self, record: ResultRecord) {
        self.results.push(record);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Newest record per test id.
    pub fn latest_per_test(&self) -> BTreeMap<&str, &ResultRecord> {
        let mut latest: BTreeMap<&str, &ResultRecord> = BTreeMap::new();
        for record in &self.results {
            latest
                .entry(record.test_id.as_str())
                .and_modify(|current| {
                    if record.timestamp > current.timestamp {
                        *current = record;
                    }
                })
                .or_insert(record);
        }
        latest
    }

    /// All records for one test, oldest first.
    pub fn for_test<'a>(&'a self, test_id: &'a str) -> impl Iterator<Item = &'a ResultRecord> {
        self.results.iter().filter(move |r| r.test_id == test_id)
    }
}
