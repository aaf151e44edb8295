//! Error types for the Nexus relay.
//!
//! Every failure is classified into one of the variants below, and each
//! variant maps deterministically to an HTTP status code and a sanitized
//! client-facing message. Raw upstream error text stays in the server logs.

use thiserror::Error;

/// Result type alias using the Nexus error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the Nexus relay.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (startup-time)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failure surfaced by the generation provider
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The generation provider did not answer within its deadline
    #[error("Upstream request timed out")]
    UpstreamTimeout,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Check if this is an upstream (provider-side) error.
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::UpstreamTimeout)
    }

    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            _ => 500,
        }
    }

    /// Message safe to return to the caller.
    ///
    /// Validation messages identify the offending field and go out as-is;
    /// everything else collapses to a fixed string so provider error text
    /// (quota ids, key fragments, endpoint URLs) never reaches the client.
    pub fn client_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => msg.clone(),
            Self::Upstream(_) => "generation service error".into(),
            Self::UpstreamTimeout => "generation request timed out".into(),
            _ => "internal server error".into(),
        }
    }
}
