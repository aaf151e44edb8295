//! Nexus Common - Shared types, utilities, and configuration for the Nexus relay.
//!
//! This crate provides:
//! - Configuration types, loading, and startup validation
//! - Error types with deterministic HTTP status mapping
//! - Logging setup and noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    Config, GatewayConfig, LlmConfig, LlmSecretsConfig, NetworkConfig, ObservabilityConfig,
    SecretsConfig, SessionConfig,
};
pub use error::{Error, Result};
