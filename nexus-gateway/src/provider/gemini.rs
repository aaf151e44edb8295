//! Google Gemini provider.
//!
//! Calls the `generativelanguage.googleapis.com` `generateContent` endpoint
//! with the full conversation history and a system instruction, and maps
//! every failure mode onto [`ProviderError`].

use super::{
    ChatTurn, GenerateReply, GenerateRequest, GenerativeProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use nexus_common::LlmConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const PROVIDER_NAME: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider backed by a shared HTTP client with explicit deadlines.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
    timeout_secs: u64,
    client: Client,
}

// ══════════════════════════════════════════════════════════════════════════════
// API REQUEST/RESPONSE TYPES
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "topP")]
    top_p: f64,
    #[serde(rename = "topK")]
    top_k: i64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i64,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<i64>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<i64>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<i64>,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    ///
    /// The API key is validated non-empty at startup, so construction never
    /// fails; a client that cannot be built with deadlines falls back to the
    /// library default.
    pub fn new(api_key: impl Into<String>, llm: &LlmConfig) -> Self {
        Self {
            api_key: api_key.into(),
            model: llm.model.clone(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: llm.request_timeout_secs,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(llm.request_timeout_secs))
                .connect_timeout(std::time::Duration::from_secs(llm.connect_timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Override the API base URL (used by tests against a local server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn build_body(request: &GenerateRequest) -> GenerateContentRequest {
        let system_instruction = request.system.as_ref().map(|sys| Content {
            role: None,
            parts: vec![Part { text: sys.clone() }],
        });

        let contents = request.turns.iter().map(content_from_turn).collect();

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: request.options.temperature,
                top_p: request.options.top_p,
                top_k: request.options.top_k,
                max_output_tokens: request.options.max_output_tokens,
                response_mime_type: "text/plain",
            },
        }
    }

    fn classify_transport_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                provider: PROVIDER_NAME.into(),
                timeout_secs: self.timeout_secs,
            }
        } else {
            ProviderError::Network {
                provider: PROVIDER_NAME.into(),
                message: e.to_string(),
            }
        }
    }
}

fn content_from_turn(turn: &ChatTurn) -> Content {
    Content {
        role: Some(turn.role.as_str().to_string()),
        parts: vec![Part {
            text: turn.content.clone(),
        }],
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateReply, ProviderError> {
        let start = Instant::now();
        let body = Self::build_body(&request);

        let response = self
            .client
            .post(self.endpoint_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: PROVIDER_NAME.into(),
                status: status.as_u16(),
                message: error_text,
            });
        }

        let result: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed {
                    provider: PROVIDER_NAME.into(),
                    message: format!("failed to parse response: {e}"),
                })?;

        // Some failures come back inside a 200 body
        if let Some(err) = result.error {
            return Err(ProviderError::Api {
                provider: PROVIDER_NAME.into(),
                status: status.as_u16(),
                message: err.message,
            });
        }

        let candidate = result
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| ProviderError::Malformed {
                provider: PROVIDER_NAME.into(),
                message: "no candidates in response".into(),
            })?;

        let text = candidate
            .content
            .parts
            .into_iter()
            .next()
            .and_then(|p| p.text)
            .unwrap_or_default();

        let usage = result
            .usage_metadata
            .map_or(TokenUsage::default(), |u| TokenUsage {
                input_tokens: u.prompt_token_count.unwrap_or(0),
                output_tokens: u.candidates_token_count.unwrap_or(0),
                total_tokens: u.total_token_count.unwrap_or(0),
            });

        Ok(GenerateReply {
            text,
            usage,
            finish_reason: candidate.finish_reason,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
