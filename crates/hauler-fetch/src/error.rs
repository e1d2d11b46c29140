//! Error types for hauler-fetch.

use thiserror::Error;

use crate::data::Response;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timeout")]
    Timeout,

    #[error("HTTP {}: {}", .0.status(), .0.text_lossy())]
    Status(Box<Response>),

    #[error("capability probe failed: {0}")]
    Probe(#[source] Box<FetchError>),

    #[error("JSON codec error: {0}")]
    Json(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unexpected status for ranged request: expected {expected}, got {actual}")]
    UnexpectedStatus { expected: u16, actual: u16 },

    #[error("body ended early: expected {expected} bytes, received {received}")]
    ShortBody { expected: u64, received: u64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

impl FetchError {
    /// Returns `true` for errors raised by the transport rather than by the
    /// server's answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_) | FetchError::Timeout)
    }

    /// The buffered response behind a status error, if any.
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchError::Status(response) => Some(response),
            FetchError::Probe(inner) => inner.response(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self { FetchError::Json(e.to_string()) }
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_builder() {
            FetchError::InvalidRequest(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
