//! Local JSON question file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tracing::instrument;

use examguard_core::model::TestDefinition;
use examguard_core::parser::parse_test_definition_str;
use examguard_core::traits::QuestionSource;

/// Reads a test definition from a JSON file on disk.
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl QuestionSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(path = %self.name))]
    async fn load(&self) -> anyhow::Result<TestDefinition> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read question file: {}", self.path.display()))?;
        parse_test_definition_str(&content, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_a_question_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");
        std::fs::write(
            &path,
            r#"{ "id": "t1", "questions": [ { "id": 1, "description": "2 + 2?", "options": [
                { "id": 1, "description": "4", "is_correct": true },
                { "id": 2, "description": "5" } ] } ] }"#,
        )
        .unwrap();

        let source = FileSource::new(&path);
        assert!(source.name().ends_with("test.json"));
        let test = source.load().await.unwrap();
        assert_eq!(test.id, "t1");
        assert_eq!(test.questions.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let source = FileSource::new("/definitely/not/here.json");
        let err = source.load().await.unwrap_err();
        assert!(err.to_string().contains("failed to read question file"));
    }
}
