//! Route definitions for the Nexus gateway.
//!
//! Serves the embedded chat page, the chat endpoint, and a health check.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use nexus_common::Config;

use crate::provider::{ChatTurn, DecodingOptions, GenerateRequest, GenerativeProvider};
use crate::sessions::SessionStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn GenerativeProvider>,
    pub sessions: Arc<SessionStore>,
    pub system_instruction: String,
    pub decoding: DecodingOptions,
    pub default_session_id: String,
}

impl AppState {
    /// Build the long-lived state from configuration and a provider.
    pub fn new(config: &Config, provider: Arc<dyn GenerativeProvider>) -> Self {
        Self {
            provider,
            sessions: Arc::new(SessionStore::new(&config.session)),
            system_instruction: config.llm.system_instruction.clone(),
            decoding: DecodingOptions::from(&config.llm),
            default_session_id: config.session.default_session_id.clone(),
        }
    }
}

/// Chat request body.
#[derive(Debug, Deserialize)]
pub struct ChatApiRequest {
    /// User message; required and non-empty
    #[serde(default)]
    pub message: Option<String>,
    /// Session key; a shared fallback is used when absent
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Chat response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub reply: String,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

/// Build the chat routes.
pub fn chat_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/chat", post(chat_handler))
        .with_state(state)
}

/// Build health check routes.
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_handler))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Serve the embedded chat page.
async fn index_handler() -> Html<&'static str> {
    Html(include_str!("assets/index.html"))
}

/// Handle a chat request: resolve the session, forward the message with the
/// accumulated history to the provider, record the exchange, relay the reply.
async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatApiRequest>,
) -> Result<Json<ChatApiResponse>, (StatusCode, Json<ErrorResponse>)> {
    let message = match request.message {
        Some(m) if !m.is_empty() => m,
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "No message provided".into(),
                }),
            ));
        }
    };

    let session_id = request
        .session_id
        .unwrap_or_else(|| state.default_session_id.clone());
    let request_id = uuid::Uuid::new_v4();

    let session = state.sessions.get_or_create(&session_id).await;
    // Held across the provider call so requests sharing a session cannot
    // interleave or lose an exchange.
    let mut session = session.lock().await;

    let mut turns = session.turns().to_vec();
    turns.push(ChatTurn::user(message.clone()));

    let generate = GenerateRequest {
        turns,
        system: Some(state.system_instruction.clone()),
        options: state.decoding.clone(),
    };

    match state.provider.generate(generate).await {
        Ok(reply) => {
            tracing::info!(
                request_id = %request_id,
                session_id = %session_id,
                latency_ms = reply.latency_ms,
                input_tokens = reply.usage.input_tokens,
                output_tokens = reply.usage.output_tokens,
                "Chat reply generated"
            );
            session.push_exchange(message, reply.text.clone());
            Ok(Json(ChatApiResponse { reply: reply.text }))
        }
        Err(e) => {
            let err = nexus_common::Error::from(e);
            // Full detail stays server-side; the client gets the sanitized text
            tracing::error!(
                request_id = %request_id,
                session_id = %session_id,
                error = %err,
                "Chat generation failed"
            );
            Err((
                StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Json(ErrorResponse {
                    error: err.client_message(),
                }),
            ))
        }
    }
}

/// Health check handler.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        service: "nexus-gateway".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_deserializes_full_body() {
        let json = r#"{"message": "hello", "session_id": "abc"}"#;
        let request: ChatApiRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.message.as_deref(), Some("hello"));
        assert_eq!(request.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn chat_request_fields_are_optional() {
        let request: ChatApiRequest = serde_json::from_str("{}").unwrap();
        assert!(request.message.is_none());
        assert!(request.session_id.is_none());
    }

    #[test]
    fn error_response_wire_shape() {
        let json = serde_json::to_string(&ErrorResponse {
            error: "No message provided".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"error":"No message provided"}"#);
    }

    #[test]
    fn chat_response_wire_shape() {
        let json = serde_json::to_string(&ChatApiResponse {
            reply: "hi".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"reply":"hi"}"#);
    }
}
