//! Nexus Gateway - session-aware chat relay over the Gemini API.
//!
//! This crate provides the HTTP service:
//! - `GET /` serves the embedded chat page
//! - `POST /chat` forwards a message (with per-session history) to the
//!   upstream generation provider and relays the reply
//! - `GET /health` liveness check
//!
//! ## Architecture
//!
//! ```text
//! Client → Gateway (validate → session lookup/create → provider call) → Gemini
//!                                     ↓
//!                            record the exchange
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod provider;
pub mod routes;
pub mod sessions;

pub use provider::{
    ChatTurn, DecodingOptions, GeminiProvider, GenerateReply, GenerateRequest, GenerativeProvider,
    ProviderError, Role, TokenUsage,
};
pub use sessions::{Session, SessionHandle, SessionStore};

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use nexus_common::Config;

/// Build the gateway router with all routes and middleware.
///
/// The provider is injected so tests can substitute a stub for the live
/// Gemini client.
pub fn build_router(config: &Config, provider: Arc<dyn GenerativeProvider>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = routes::AppState::new(config, provider);

    Router::new()
        .merge(routes::chat_routes(state))
        .merge(routes::health_routes())
        .layer(cors)
}

/// Start the gateway server.
///
/// Expects `Config::validate_for_startup` to have passed already; the
/// credential check here is a terminal guard for callers that skipped it.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let api_key = config
        .google_api_key()
        .ok_or_else(|| anyhow::anyhow!("Google API key missing; run startup validation first"))?;

    let provider = Arc::new(GeminiProvider::new(api_key, &config.llm));
    let router = build_router(config, provider);

    let addr = SocketAddr::from((
        config.network.bind.parse::<std::net::IpAddr>()?,
        config.gateway.port,
    ));

    tracing::info!(
        addr = %addr,
        model = %config.llm.model,
        "Starting Nexus Gateway"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
