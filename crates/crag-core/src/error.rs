//! Error types for crag-core

use thiserror::Error;

use crate::util::compact_text;

/// Result type alias using crag-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in crag-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote resource does not exist (e.g. unknown file uuid)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server answered with an unexpected status
    #[error("Request failed with HTTP {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// Server payload could not be parsed
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Transport-level failure (DNS, connect, TLS, timeout)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Tried to push local edits without an API key
    #[error("No API key configured; local edits cannot be pushed")]
    MissingCredential,

    /// Local state does not allow the operation (e.g. missing sidecar)
    #[error("Invalid state: {0}")]
    State(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation was cancelled cooperatively
    #[error("Operation cancelled")]
    Cancelled,
}

/// Retry policy classification for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
}

impl Error {
    /// Build a `RequestFailed` from a status and a raw response body.
    pub fn request_failed(status: u16, body: &str) -> Self {
        Self::RequestFailed {
            status,
            body: compact_text(body),
        }
    }

    /// Whether a scheduler should try the failed operation again later.
    pub const fn retry_class(&self) -> RetryClass {
        match self {
            Self::RequestFailed { status, .. } => classify_http_status(*status),
            Self::Network(_) | Self::Io(_) | Self::MalformedResponse(_) => RetryClass::Retryable,
            _ => RetryClass::Permanent,
        }
    }

    pub const fn is_retryable(&self) -> bool {
        matches!(self.retry_class(), RetryClass::Retryable)
    }
}

/// Classify an HTTP status into retry behavior.
pub const fn classify_http_status(status: u16) -> RetryClass {
    match status {
        408 | 409 | 423 | 425 | 429 | 500..=599 => RetryClass::Retryable,
        _ => RetryClass::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_http_status_for_retry_policy() {
        assert_eq!(classify_http_status(500), RetryClass::Retryable);
        assert_eq!(classify_http_status(503), RetryClass::Retryable);
        assert_eq!(classify_http_status(429), RetryClass::Retryable);
        assert_eq!(classify_http_status(401), RetryClass::Permanent);
        assert_eq!(classify_http_status(422), RetryClass::Permanent);
    }

    #[test]
    fn malformed_responses_are_retryable() {
        assert!(Error::MalformedResponse("eof".to_string()).is_retryable());
        assert!(!Error::MissingCredential.is_retryable());
        assert!(!Error::request_failed(400, "bad field").is_retryable());
    }

    #[test]
    fn request_failed_compacts_body() {
        let body = "x".repeat(500);
        match Error::request_failed(500, &body) {
            Error::RequestFailed { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), 180);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
