//! Durable local result storage.
//!
//! The store is a JSON object file used as a small key-value store. The
//! result log lives under [`RESULTS_KEY`]; any other keys in the file are
//! left untouched.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use examguard_core::results::{ResultLog, ResultRecord, RESULTS_KEY};
use examguard_core::traits::ResultSink;

/// Appends result records to a JSON file.
pub struct JsonResultStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored result log. A missing file or key is an empty log.
    pub async fn load(&self) -> Result<ResultLog> {
        let root = self.read_root().await?;
        log_from_root(&root, &self.path)
    }

    async fn read_root(&self) -> Result<Map<String, Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read results from {}", self.path.display()))
            }
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse results file: {}", self.path.display()))
    }

    async fn write_root(&self, root: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(root).context("failed to serialize results")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn log_from_root(root: &Map<String, Value>, path: &Path) -> Result<ResultLog> {
    match root.get(RESULTS_KEY) {
        None | Some(Value::Null) => Ok(ResultLog::default()),
        Some(value) => serde_json::from_value(value.clone()).with_context(|| {
            format!("malformed {RESULTS_KEY} entry in {}", path.display())
        }),
    }
}

#[async_trait]
impl ResultSink for JsonResultStore {
    async fn append(&self, record: &ResultRecord) -> Result<()> {
        let _guard = self.lock.lock().await;

        let mut root = self.read_root().await?;
        let mut log = log_from_root(&root, &self.path)?;
        log.push(record.clone());
        root.insert(
            RESULTS_KEY.to_string(),
            serde_json::to_value(&log).context("failed to serialize result log")?,
        );
        self.write_root(&root).await?;

        tracing::info!(
            test = %record.test_id,
            score = record.score,
            total = log.len(),
            path = %self.path.display(),
            "result saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn record(test_id: &str, score: f64) -> ResultRecord {
        ResultRecord {
            test_id: test_id.into(),
            score,
            percentage: score / 40.0 * 100.0,
            correct: 0,
            incorrect: 0,
            unattempted: 0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonResultStore::new(dir.path().join("results.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn appends_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonResultStore::new(dir.path().join("nested").join("results.json"));
        store.append(&record("a", 10.0)).await.unwrap();
        store.append(&record("b", 20.0)).await.unwrap();

        let log = store.load().await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.results[1].test_id, "b");

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["testResults"]["results"][0]["testId"], "a");
    }

    #[tokio::test]
    async fn other_keys_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, r#"{ "theme": "dark", "testResults": { "results": [] } }"#).unwrap();

        let store = JsonResultStore::new(&path);
        store.append(&record("a", 10.0)).await.unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonResultStore::new(dir.path().join("results.json")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.append(&record(&format!("t{i}"), 1.0)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.load().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonResultStore::new(&path);
        assert!(store.append(&record("a", 1.0)).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json");
    }
}
