//! LLM provider abstraction and the Gemini REST implementation.
//!
//! The pipeline never talks to an inference API directly — it goes through
//! the [`LlmProvider`] trait so tests can inject a deterministic stub and the
//! retry logic in [`crate::pipeline::llm`] stays independent of any vendor's
//! wire format. The shipped implementation targets the Gemini
//! `generateContent` endpoint, matching the service the report prompts were
//! tuned against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ReportConfig;
use crate::error::ReportError;

/// Default Gemini model used when the config does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Sampling options for a single completion call.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// A completed inference call: the generated text plus token accounting.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Errors from a single provider call. These are retried by the pipeline's
/// backoff wrapper and only surface to callers (wrapped in
/// [`ReportError::StageFailed`]) once retries are exhausted.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Inference call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Inference API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Inference API returned no candidates")]
    EmptyResponse,

    #[error("Failed to parse inference response: {0}")]
    Parse(String),
}

/// A text-in, text-out inference service.
///
/// `Send + Sync` so a single provider can be shared across stages behind an
/// `Arc`. Implementations should apply their own request timeout.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one completion for the given prompt.
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, ProviderError>;

    /// Short provider name for log lines.
    fn name(&self) -> &str {
        "llm"
    }
}

// ── Gemini wire types ────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata", default)]
    usage: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u64,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u64,
}

// ── Gemini provider ──────────────────────────────────────────────────────

/// Gemini `generateContent` client.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl GeminiProvider {
    /// Create a provider for the given key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ReportError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            client,
            timeout_secs,
        })
    }

    /// Point the provider at a different endpoint. Used by tests against a
    /// local HTTP stub; production code never calls this.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
            },
        };

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    secs: self.timeout_secs,
                }
            } else {
                ProviderError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        let usage = parsed.usage.unwrap_or_default();
        debug!(
            model = %self.model,
            prompt_tokens = usage.prompt_token_count,
            completion_tokens = usage.candidates_token_count,
            "completion received"
        );

        Ok(Completion {
            text,
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
        })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed it
///    entirely; used as-is. This is how tests inject a deterministic stub.
/// 2. **API key in config** (`config.api_key`) — explicit key wins over the
///    environment so one process can serve different tenants.
/// 3. **`GEMINI_API_KEY` environment variable** — the zero-config path.
///
/// With none of the three, startup halts with a user-visible hint — the
/// pipeline never begins a run it cannot finish.
pub fn resolve_provider(config: &ReportConfig) -> Result<Arc<dyn LlmProvider>, ReportError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let key = match config.api_key.clone() {
        Some(k) if !k.is_empty() => k,
        _ => match std::env::var("GEMINI_API_KEY") {
            Ok(k) if !k.is_empty() => k,
            _ => {
                return Err(ReportError::MissingApiKey {
                    hint: "Set GEMINI_API_KEY in the environment, pass an API key in the \
                           configuration, or inject a pre-built provider."
                        .into(),
                })
            }
        },
    };

    Ok(Arc::new(GeminiProvider::new(
        key,
        config.model.clone(),
        config.api_timeout_secs,
    )?))
}
