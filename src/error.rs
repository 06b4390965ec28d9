//! Error types for the Aura assistant

use thiserror::Error;

/// Result type alias for Aura operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Aura assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Generation backend unreachable or refused the request
    #[error("connection error: {0}")]
    Connection(String),

    /// Request exceeded its deadline
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Generation backend returned a non-2xx response
    #[error("backend error {status}: {body}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// In-flight request was superseded or explicitly aborted
    #[error("request aborted")]
    Aborted,

    /// Conversation cannot accept input right now
    #[error("chat is busy: {0}")]
    Busy(String),

    /// No complete bracketed span found in a structured reply
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Extracted span is not valid structured data
    #[error("parse error: {0}")]
    Parse(String),

    /// Microphone access denied by the platform
    #[error("speech permission denied: {0}")]
    Permission(String),

    /// Platform speech recognition failure
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Speech synthesis failure
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
