//! Provider abstraction for the upstream generative-language API.
//!
//! The gateway talks to the upstream service through the [`GenerativeProvider`]
//! trait so tests can swap in stubs and the HTTP layer never depends on a
//! concrete wire format.

mod gemini;

pub use gemini::GeminiProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Provider Trait
// ============================================================================

/// Unified interface for generation providers.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Generate a reply for the given conversation.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateReply, ProviderError>;
}

/// Error from a provider, classified by kind.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request did not complete within the configured deadline.
    #[error("{provider} request timed out after {timeout_secs}s")]
    Timeout { provider: String, timeout_secs: u64 },

    /// Transport-level failure before a response was received.
    #[error("{provider} network error: {message}")]
    Network { provider: String, message: String },

    /// The API answered with a non-success status.
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// The API answered 2xx but the body was not usable.
    #[error("{provider} returned a malformed response: {message}")]
    Malformed { provider: String, message: String },
}

impl From<ProviderError> for nexus_common::Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout { .. } => Self::UpstreamTimeout,
            other => Self::Upstream(other.to_string()),
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Speaker of a conversation turn, in the upstream's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// End-user message
    User,
    /// Model reply
    Model,
}

impl Role {
    /// Wire name used by the Gemini API.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// Decoding parameters forwarded to the upstream API.
#[derive(Debug, Clone)]
pub struct DecodingOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: i64,
    pub max_output_tokens: i64,
}

impl From<&nexus_common::LlmConfig> for DecodingOptions {
    fn from(llm: &nexus_common::LlmConfig) -> Self {
        Self {
            temperature: llm.temperature,
            top_p: llm.top_p,
            top_k: llm.top_k,
            max_output_tokens: llm.max_output_tokens,
        }
    }
}

/// A generation request: full history (newest user turn last) plus settings.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Conversation so far, ending with the turn to answer
    pub turns: Vec<ChatTurn>,
    /// System-level behavioral instruction
    pub system: Option<String>,
    /// Decoding parameters
    pub options: DecodingOptions,
}

/// A generated reply.
#[derive(Debug, Clone)]
pub struct GenerateReply {
    /// Reply text
    pub text: String,
    /// Token usage reported by the upstream
    pub usage: TokenUsage,
    /// Finish reason, if reported
    pub finish_reason: Option<String>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}
