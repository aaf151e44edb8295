//! Configuration management for the Nexus relay.
//!
//! Configuration lives in a single JSON file at `~/.nexus/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `NEXUS_PORT` → gateway.port
//! - `NEXUS_BIND_ADDRESS` → network.bind
//! - `NEXUS_LOG_LEVEL` → observability.log_level
//! - `GEMINI_API_KEY` / `GOOGLE_API_KEY` → secrets.llm.google

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".nexus"),
        |dirs| dirs.home_dir().join(".nexus"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Bind address for the gateway.
///
/// Default is `0.0.0.0` so browser frontends on other hosts can reach the
/// relay directly. Set to `127.0.0.1` to restrict to local access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".into()
}

// ============================================================================
// Gateway Configuration
// ============================================================================

/// Gateway HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Port the HTTP server listens on
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_port() -> u16 {
    5000
}

// ============================================================================
// LLM Configuration
// ============================================================================

/// Generation settings for the upstream Gemini API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name, e.g. "gemini-2.0-flash"
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Nucleus sampling threshold
    #[serde(default = "default_top_p")]
    pub top_p: f64,

    /// Top-k sampling cutoff
    #[serde(default = "default_top_k")]
    pub top_k: i64,

    /// Maximum tokens to generate per reply
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: i64,

    /// System-level behavioral instruction sent with every request
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,

    /// Total request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
            system_instruction: default_system_instruction(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_llm_model() -> String {
    "gemini-2.0-flash".into()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.95
}

fn default_top_k() -> i64 {
    64
}

fn default_max_output_tokens() -> i64 {
    8192
}

fn default_system_instruction() -> String {
    "You are Nexus AI. Analyze the user's question. If simple, answer in 1 sentence. \
     If complex, explain using ONE simple analogy and keep it under 3 sentences. \
     Do not use filler phrases."
        .into()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_connect_timeout() -> u64 {
    10
}

// ============================================================================
// Session Configuration
// ============================================================================

/// Session registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of live sessions; least-recently-used sessions are
    /// evicted when the bound is reached
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Seconds of inactivity after which a session is evicted
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,

    /// Session id used when the client does not supply one
    #[serde(default = "default_session_id")]
    pub default_session_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            idle_ttl_secs: default_idle_ttl(),
            default_session_id: default_session_id(),
        }
    }
}

fn default_max_sessions() -> usize {
    1024
}

fn default_idle_ttl() -> u64 {
    3600
}

fn default_session_id() -> String {
    "default_session".into()
}

// ============================================================================
// Secrets Configuration
// ============================================================================

/// Grouped secrets configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    /// LLM provider API keys
    #[serde(default)]
    pub llm: LlmSecretsConfig,
}

/// LLM provider API keys.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmSecretsConfig {
    #[serde(default)]
    pub google: Option<String>,
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure for the Nexus relay.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Bind address
    #[serde(default)]
    pub network: NetworkConfig,

    /// HTTP server settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Upstream generation settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Session registry settings
    #[serde(default)]
    pub session: SessionConfig,

    /// API keys
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Logging settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> anyhow::Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("NEXUS_PORT") {
            if let Ok(p) = port.parse() {
                self.gateway.port = p;
            }
        }

        if let Ok(bind) = std::env::var("NEXUS_BIND_ADDRESS") {
            self.network.bind = bind;
        }

        if let Ok(level) = std::env::var("NEXUS_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Ok(key) =
            std::env::var("GEMINI_API_KEY").or_else(|_| std::env::var("GOOGLE_API_KEY"))
        {
            self.secrets.llm.google = Some(key);
        }
    }

    /// The Google API key, if configured.
    pub fn google_api_key(&self) -> Option<&str> {
        self.secrets
            .llm
            .google
            .as_deref()
            .filter(|k| !k.is_empty())
    }

    /// Validate everything the server needs before it starts serving.
    ///
    /// A missing credential aborts startup here rather than failing every
    /// chat request after boot.
    pub fn validate_for_startup(&self) -> Result<()> {
        if self.google_api_key().is_none() {
            return Err(Error::Config(
                "Google API key not set. Provide GEMINI_API_KEY (or GOOGLE_API_KEY) \
                 in the environment, or secrets.llm.google in ~/.nexus/config.json"
                    .into(),
            ));
        }

        if self.gateway.port == 0 {
            return Err(Error::Config("gateway.port must be non-zero".into()));
        }

        if self.llm.model.is_empty() {
            return Err(Error::Config("llm.model must not be empty".into()));
        }

        Ok(())
    }
}
