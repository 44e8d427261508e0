//! Error types for pumadash.
//!
//! This module defines all error types used throughout the pumadash crate.
//! Fetch errors never reach the user as hard failures; the poll loop turns
//! them into state transitions. Configuration and terminal errors abort.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for pumadash operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Transport Errors ===
    /// The request could not be sent or the connection failed.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// The requested URL.
        url: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success HTTP status.
    #[error("request to {url} returned HTTP {status}")]
    HttpStatus {
        /// The requested URL.
        url: String,
        /// The returned status code.
        status: u16,
    },

    /// The request exceeded the configured timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// The requested URL.
        url: String,
    },

    // === Decode Errors ===
    /// The response body was not the expected JSON shape.
    #[error("malformed response from {url}: {message}")]
    Decode {
        /// The requested URL.
        url: String,
        /// Description of the decode failure.
        message: String,
    },

    // === Health Errors ===
    /// The status endpoint could not be reached or understood.
    #[error("health check failed: {message}")]
    HealthCheck {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A history limit outside the selectable set.
    #[error("invalid history limit {0} (expected one of 50, 100, 150, 300)")]
    InvalidHistoryLimit(u32),

    // === I/O Errors ===
    /// File system or terminal operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for pumadash operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Classify a reqwest error raised while talking to `url`.
    #[must_use]
    pub fn from_reqwest(url: impl Into<String>, err: reqwest::Error) -> Self {
        let url = url.into();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_decode() {
            Self::Decode {
                url,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                url,
                status: status.as_u16(),
            }
        } else {
            Self::Transport { url, source: err }
        }
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a health check error.
    #[must_use]
    pub fn health_check(message: impl Into<String>) -> Self {
        Self::HealthCheck {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means the backend could not be reached in time.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::HttpStatus { .. } | Self::Timeout { .. }
        )
    }

    /// Check if this error is a malformed response body.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
