//! Error types shared by both backends and the hybrid client.

use thiserror::Error;

/// Failure reported by either backend.
///
/// The hybrid client never retries; whatever a backend returns here is
/// handed to the caller unchanged.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

pub type Result<T, E = BackendError> = std::result::Result<T, E>;
