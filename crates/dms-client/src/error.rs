//! Dead Man's Snitch client errors

use thiserror::Error;

/// Errors that can occur when interacting with the Dead Man's Snitch API
#[derive(Debug, Error)]
pub enum DmsError {
    /// HTTP request/response error (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Dead Man's Snitch API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Authentication failed (invalid or revoked API key)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request (e.g., empty snitch name)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl DmsError {
    /// Whether retrying the same call later can succeed.
    ///
    /// Transport failures, throttling and server-side errors are transient.
    /// Rejected credentials and malformed requests are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            DmsError::Http(_) => true,
            DmsError::Api { status, .. } => *status == 429 || *status >= 500,
            DmsError::NotFound(_) => true,
            DmsError::Authentication(_)
            | DmsError::Serialization(_)
            | DmsError::InvalidRequest(_) => false,
        }
    }
}
