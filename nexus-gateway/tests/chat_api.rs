//! Integration tests for the Nexus gateway.
//!
//! Exercises the full HTTP API against stub providers: validation, history
//! accumulation, session isolation, error sanitization, and the
//! concurrent-first-request guarantee.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use async_trait::async_trait;
use nexus_common::Config;
use nexus_gateway::routes::{chat_routes, AppState};
use nexus_gateway::{
    build_router, ChatTurn, GenerateReply, GenerateRequest, GenerativeProvider, ProviderError,
    Role, TokenUsage,
};

// ─────────────────────────────────────────────────────────────────────────────
// Stub providers
// ─────────────────────────────────────────────────────────────────────────────

/// Replies with the content of the last user turn.
struct EchoProvider {
    /// Artificial delay, to widen race windows in concurrency tests
    delay_ms: u64,
}

impl EchoProvider {
    fn new() -> Self {
        Self { delay_ms: 0 }
    }

    fn slow(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

#[async_trait]
impl GenerativeProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateReply, ProviderError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        let text = request
            .turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.clone())
            .unwrap_or_default();
        Ok(GenerateReply {
            text,
            usage: TokenUsage::default(),
            finish_reason: Some("STOP".into()),
            latency_ms: self.delay_ms,
        })
    }
}

/// Records the history received with every request and answers "ack:<n>".
struct RecordingProvider {
    seen: Arc<Mutex<Vec<Vec<ChatTurn>>>>,
}

impl RecordingProvider {
    fn new() -> (Self, Arc<Mutex<Vec<Vec<ChatTurn>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                seen: Arc::clone(&seen),
            },
            seen,
        )
    }
}

#[async_trait]
impl GenerativeProvider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateReply, ProviderError> {
        let mut seen = self.seen.lock().unwrap();
        seen.push(request.turns.clone());
        Ok(GenerateReply {
            text: format!("ack:{}", seen.len()),
            usage: TokenUsage::default(),
            finish_reason: Some("STOP".into()),
            latency_ms: 1,
        })
    }
}

/// Always fails with the given provider error.
struct FailingProvider {
    build_error: fn() -> ProviderError,
}

#[async_trait]
impl GenerativeProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateReply, ProviderError> {
        Err((self.build_error)())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn test_config() -> Config {
    let mut config = Config::default();
    config.secrets.llm.google = Some("test-key".into());
    config
}

fn create_test_app(provider: Arc<dyn GenerativeProvider>) -> axum::Router {
    build_router(&test_config(), provider)
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

async fn post_chat(app: &axum::Router, body: Value) -> (StatusCode, Value) {
    let response = app.clone().oneshot(chat_request(body)).await.unwrap();
    response_json(response).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Static Page and Health Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_index_serves_page() {
    let app = create_test_app(Arc::new(EchoProvider::new()));

    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));

    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    assert!(!body.is_empty());
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(Arc::new(EchoProvider::new()));

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let (status, json) = response_json(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "nexus-gateway");
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_missing_message_is_rejected() {
    let app = create_test_app(Arc::new(EchoProvider::new()));

    let (status, json) = post_chat(&app, json!({"session_id": "abc"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({"error": "No message provided"}));
}

#[tokio::test]
async fn test_chat_empty_message_is_rejected() {
    let app = create_test_app(Arc::new(EchoProvider::new()));

    let (status, json) = post_chat(&app, json!({"message": ""})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({"error": "No message provided"}));
}

#[tokio::test]
async fn test_chat_null_message_is_rejected() {
    let app = create_test_app(Arc::new(EchoProvider::new()));

    let (status, json) = post_chat(&app, json!({"message": null})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No message provided");
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_echo_roundtrip() {
    let app = create_test_app(Arc::new(EchoProvider::new()));

    let (status, json) = post_chat(&app, json!({"message": "hello"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"reply": "hello"}));
}

#[tokio::test]
async fn test_history_accumulates_within_session() {
    let (provider, seen) = RecordingProvider::new();
    let app = create_test_app(Arc::new(provider));

    let (status, first) = post_chat(&app, json!({"message": "M1", "session_id": "s1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["reply"], "ack:1");

    let (status, _) = post_chat(&app, json!({"message": "M2", "session_id": "s1"})).await;
    assert_eq!(status, StatusCode::OK);

    let seen = seen.lock().unwrap();
    // First request carried only M1
    assert_eq!(seen[0].len(), 1);
    assert_eq!(seen[0][0].content, "M1");
    // Second request carried M1, its reply, then M2
    assert_eq!(seen[1].len(), 3);
    assert_eq!(seen[1][0].content, "M1");
    assert_eq!(seen[1][0].role, Role::User);
    assert_eq!(seen[1][1].content, "ack:1");
    assert_eq!(seen[1][1].role, Role::Model);
    assert_eq!(seen[1][2].content, "M2");
}

#[tokio::test]
async fn test_sessions_do_not_intermix() {
    let (provider, seen) = RecordingProvider::new();
    let app = create_test_app(Arc::new(provider));

    post_chat(&app, json!({"message": "for-a", "session_id": "a"})).await;
    post_chat(&app, json!({"message": "for-b", "session_id": "b"})).await;

    let seen = seen.lock().unwrap();
    // Session "b" starts from empty history; nothing from "a" leaked in
    assert_eq!(seen[1].len(), 1);
    assert_eq!(seen[1][0].content, "for-b");
}

#[tokio::test]
async fn test_anonymous_requests_share_default_session() {
    let (provider, seen) = RecordingProvider::new();
    let app = create_test_app(Arc::new(provider));

    post_chat(&app, json!({"message": "first"})).await;
    post_chat(&app, json!({"message": "second"})).await;

    let seen = seen.lock().unwrap();
    // Second anonymous request sees the first exchange
    assert_eq!(seen[1].len(), 3);
    assert_eq!(seen[1][0].content, "first");
}

// ─────────────────────────────────────────────────────────────────────────────
// Upstream Failure Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_upstream_failure_returns_sanitized_500() {
    let app = create_test_app(Arc::new(FailingProvider {
        build_error: || ProviderError::Api {
            provider: "gemini".into(),
            status: 429,
            message: "quota exceeded for key sk-secret-token".into(),
        },
    }));

    let (status, json) = post_chat(&app, json!({"message": "hello"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "generation service error");
    // Raw upstream detail must not leak to the caller
    assert!(!json.to_string().contains("sk-secret-token"));
}

#[tokio::test]
async fn test_upstream_timeout_returns_timeout_message() {
    let app = create_test_app(Arc::new(FailingProvider {
        build_error: || ProviderError::Timeout {
            provider: "gemini".into(),
            timeout_secs: 120,
        },
    }));

    let (status, json) = post_chat(&app, json!({"message": "hello"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "generation request timed out");
}

#[tokio::test]
async fn test_failed_exchange_is_not_recorded() {
    let failing = Arc::new(FailingProvider {
        build_error: || ProviderError::Network {
            provider: "gemini".into(),
            message: "connection reset".into(),
        },
    });
    let config = test_config();
    let state = AppState::new(&config, failing);
    let app = chat_routes(state.clone());

    let (status, _) = post_chat(&app, json!({"message": "m", "session_id": "s"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // The failed exchange left no history behind
    let session = state.sessions.get_or_create("s").await;
    assert!(session.lock().await.turns().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrency Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_first_requests_share_one_session() {
    const N: usize = 16;

    let config = test_config();
    let state = AppState::new(&config, Arc::new(EchoProvider::slow(5)));
    let app = chat_routes(state.clone());

    let mut tasks = Vec::new();
    for i in 0..N {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            let response = app
                .oneshot(chat_request(
                    json!({"message": format!("m{}", i), "session_id": "burst"}),
                ))
                .await
                .unwrap();
            response.status()
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    // Exactly one context was created and no exchange was lost
    assert_eq!(state.sessions.len().await, 1);
    let session = state.sessions.get_or_create("burst").await;
    assert_eq!(session.lock().await.turns().len(), 2 * N);
}
