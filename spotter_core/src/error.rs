//! Error types for the spotter_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for spotter_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing credential (HTTP 401, or no key configured)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Non-2xx response from an external API
    #[error("{service} API error ({status}): {body}")]
    Remote {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected structured shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Input or generated data rejected before any write call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport-level failure (connect, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the fix for this failure lives in the user's settings
    pub fn is_user_actionable(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}
