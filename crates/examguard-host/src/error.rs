//! Question source error types.

use thiserror::Error;

/// Errors that can occur while fetching a test definition.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The test does not exist at the source.
    #[error("test not found: {0}")]
    NotFound(String),

    /// The server rejected the credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server returned an error response.
    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),
}
