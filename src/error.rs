// src/error.rs

//! Unified error handling for snapshot acquisition.

use std::fmt;

use thiserror::Error;

/// Result type alias for acquisition operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
///
/// Rate limits, skippable 404s and transient transport failures are not
/// errors; they are handled as [`Outcome`](crate::services::Outcome)
/// branches inside the fetch loops. Only the conditions below abort a run.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A resource that cannot be skipped answered 404
    #[error("Resource not found: {url}")]
    NotFound { url: String },

    /// The response did not have the expected shape
    #[error("Unexpected payload for {context}: {message}")]
    UnexpectedPayload { context: String, message: String },

    /// Retry budget used up on a retryable condition
    #[error("Retries exhausted for {context} after {attempts} attempts: {reason}")]
    RetriesExhausted {
        context: String,
        attempts: u32,
        reason: String,
    },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unexpected payload error with context.
    pub fn unexpected_payload(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::UnexpectedPayload {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error came from the remote API rather than local setup.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::UnexpectedPayload { .. } | Self::RetriesExhausted { .. }
        )
    }
}
