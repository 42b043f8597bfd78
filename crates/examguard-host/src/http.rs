//! Remote question bank over HTTP.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use examguard_core::model::TestDefinition;
use examguard_core::parser::parse_test_definition_str;
use examguard_core::traits::QuestionSource;

use crate::error::SourceError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fetches a test definition with a `GET` request.
pub struct HttpSource {
    url: String,
    bearer_token: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            client: reqwest::Client::new(),
        }
    }

    /// Send `Authorization: Bearer <token>` with the request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.bearer_token = (!token.is_empty()).then_some(token);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl QuestionSource for HttpSource {
    fn name(&self) -> &str {
        &self.url
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn load(&self) -> anyhow::Result<TestDefinition> {
        let mut request = self
            .client
            .get(&self.url)
            .timeout(Duration::from_secs(self.timeout_secs));
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                SourceError::Network(format!("question server not reachable at {}", self.url))
            } else {
                SourceError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        match status {
            404 => return Err(SourceError::NotFound(self.url.clone()).into()),
            401 | 403 => {
                let body = response.text().await.unwrap_or_default();
                return Err(SourceError::AuthenticationFailed(body).into());
            }
            s if s >= 400 => {
                let body = response.text().await.unwrap_or_default();
                return Err(SourceError::Http {
                    status,
                    message: body,
                }
                .into());
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("failed to read response: {e}")))?;
        tracing::debug!(bytes = body.len(), "fetched question bank");
        parse_test_definition_str(&body, &PathBuf::from(&self.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn question_bank() -> serde_json::Value {
        serde_json::json!({
            "id": "genetics",
            "title": "Genetics",
            "duration": 10,
            "questions": [{
                "id": 1,
                "description": "Unit of heredity?",
                "options": [
                    {"id": 1, "description": "Gene", "is_correct": true},
                    {"id": 2, "description": "Cell", "is_correct": false}
                ]
            }]
        })
    }

    #[tokio::test]
    async fn successful_fetch_with_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tests/genetics.json"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(question_bank()))
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpSource::new(format!("{}/tests/genetics.json", server.uri()))
            .with_bearer_token("secret");
        let test = source.load().await.unwrap();
        assert_eq!(test.id, "genetics");
        assert_eq!(test.duration_minutes, 10);
    }

    #[tokio::test]
    async fn not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpSource::new(format!("{}/missing.json", server.uri()));
        let err = source.load().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn server_error_keeps_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let source = HttpSource::new(server.uri());
        let err = source.load().await.unwrap_err();
        match err.downcast_ref::<SourceError>() {
            Some(SourceError::Http { status, message }) => {
                assert_eq!(*status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let err = HttpSource::new(server.uri()).load().await.unwrap_err();
        assert!(err.to_string().contains("authentication failed"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_data_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
            .mount(&server)
            .await;

        let err = HttpSource::new(server.uri()).load().await.unwrap_err();
        assert!(format!("{err:#}").contains("invalid question data format"));
    }

    #[tokio::test]
    async fn connection_refused_is_a_network_error() {
        // Port 9 (discard) is almost never listening.
        let source = HttpSource::new("http://127.0.0.1:9/test.json").with_timeout(2);
        let err = source.load().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::Network(_) | SourceError::Timeout(_))
        ));
    }
}
