//! HTTP error types

use std::time::Duration;

/// Error type for HTTP operations
///
/// Only transport failures are errors. A response with any status is an
/// `ApiResponse`, even when its body cannot be decoded.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl HttpError {
    /// Classify a reqwest failure
    pub fn from_transport(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            HttpError::Timeout(timeout)
        } else if error.is_connect() {
            HttpError::Connect(error.to_string())
        } else {
            HttpError::NetworkError(error)
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout(_))
    }

    /// Short label for log lines and metrics tags
    pub fn kind(&self) -> &'static str {
        match self {
            HttpError::Timeout(_) => "timeout",
            HttpError::Connect(_) => "connect",
            HttpError::NetworkError(_) => "network",
            HttpError::InvalidUrl(_) => "invalid_url",
            HttpError::Tls(_) => "tls",
            HttpError::ConfigError(_) => "config",
        }
    }
}
