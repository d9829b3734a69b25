//! Configuration types for report generation.
//!
//! All pipeline behaviour is controlled through [`ReportConfig`], built via
//! its [`ReportConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config across runs, serialise the interesting parts for
//! logging, and diff two runs to understand why their outputs differ.

use crate::error::ReportError;
use crate::pipeline::search::SearchClient;
use crate::progress::ReportProgressCallback;
use crate::provider::{LlmProvider, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for one report-generation run.
///
/// Built via [`ReportConfig::builder()`] or [`ReportConfig::default()`].
///
/// # Example
/// ```rust
/// use medreport::{ReportConfig, ReportStyle};
///
/// let config = ReportConfig::builder()
///     .model("gemini-2.0-flash")
///     .style(ReportStyle::Clinical)
///     .max_retries(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReportConfig {
    /// Inference model identifier. Default: `gemini-2.0-flash`.
    pub model: String,

    /// Explicit API key. If `None`, `GEMINI_API_KEY` is read from the
    /// environment during provider resolution.
    pub api_key: Option<String>,

    /// Pre-constructed provider. Takes precedence over `api_key`; this is
    /// the injection point for deterministic stubs in tests.
    pub provider: Option<Arc<dyn LlmProvider>>,

    /// Sampling temperature. Default: 0.3.
    ///
    /// Low enough that the report stays faithful to the input values, high
    /// enough that the narrative text does not read as boilerplate.
    pub temperature: f32,

    /// Maximum tokens the model may generate per stage. Default: 2048.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient inference failure. Default: 3.
    ///
    /// Permanent errors are indistinguishable from transient ones at this
    /// layer, so the cap also bounds how long a misconfigured run can spin.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-inference-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Run the web-search validation stage. Default: true.
    ///
    /// When disabled the validation stage still runs (so progress events and
    /// stage accounting stay uniform) but performs no network call and leaves
    /// the references empty.
    pub validate_online: bool,

    /// Maximum search terms per run. Default: 2.
    pub max_search_terms: usize,

    /// Maximum results fetched per search term. Default: 2.
    pub max_search_results: usize,

    /// Per-search-request timeout in seconds. Default: 10.
    ///
    /// Short on purpose: validation is best-effort and must never dominate
    /// the run time of the report.
    pub search_timeout_secs: u64,

    /// Pre-constructed search client. Used by tests; when `None` the
    /// DuckDuckGo client is built on demand.
    pub search_client: Option<Arc<dyn SearchClient>>,

    /// Which final-report prompt variant to use. Default: patient-friendly.
    pub style: ReportStyle,

    /// Optional per-stage progress callback.
    pub progress_callback: Option<Arc<dyn ReportProgressCallback>>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            provider: None,
            temperature: 0.3,
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            validate_online: true,
            max_search_terms: 2,
            max_search_results: 2,
            search_timeout_secs: 10,
            search_client: None,
            style: ReportStyle::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LlmProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("validate_online", &self.validate_online)
            .field("max_search_terms", &self.max_search_terms)
            .field("max_search_results", &self.max_search_results)
            .field("style", &self.style)
            .finish()
    }
}

impl ReportConfig {
    /// Create a new builder for `ReportConfig`.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ReportConfig`].
#[derive(Debug)]
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl ReportConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn validate_online(mut self, v: bool) -> Self {
        self.config.validate_online = v;
        self
    }

    pub fn max_search_terms(mut self, n: usize) -> Self {
        self.config.max_search_terms = n;
        self
    }

    pub fn max_search_results(mut self, n: usize) -> Self {
        self.config.max_search_results = n;
        self
    }

    pub fn search_timeout_secs(mut self, secs: u64) -> Self {
        self.config.search_timeout_secs = secs.max(1);
        self
    }

    pub fn search_client(mut self, client: Arc<dyn SearchClient>) -> Self {
        self.config.search_client = Some(client);
        self
    }

    pub fn style(mut self, style: ReportStyle) -> Self {
        self.config.style = style;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ReportProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReportConfig, ReportError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ReportError::InvalidConfig("model must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&c.temperature) {
            return Err(ReportError::InvalidConfig(format!(
                "temperature must be 0.0-2.0, got {}",
                c.temperature
            )));
        }
        if c.validate_online && c.max_search_terms == 0 {
            return Err(ReportError::InvalidConfig(
                "max_search_terms must be >= 1 when online validation is enabled".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Which final-report prompt variant the composition stage uses.
///
/// Both variants share the pipeline; only the last prompt differs. Keeping
/// this a config knob rather than two entry points means callers can offer
/// both documents from one run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStyle {
    /// Narrative report in plain language with next-step guidance. (default)
    #[default]
    PatientFriendly,
    /// Concise clinician-facing summary; facts only, no filler sections.
    Clinical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_original_service_settings() {
        let c = ReportConfig::default();
        assert_eq!(c.model, "gemini-2.0-flash");
        assert!((c.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(c.max_search_terms, 2);
        assert_eq!(c.max_search_results, 2);
        assert!(c.validate_online);
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = ReportConfig::builder().temperature(5.0).build().unwrap();
        assert!((c.temperature - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_model_rejected() {
        let result = ReportConfig::builder().model("  ").build();
        assert!(matches!(result, Err(ReportError::InvalidConfig(_))));
    }

    #[test]
    fn zero_search_terms_rejected_when_online() {
        let result = ReportConfig::builder().max_search_terms(0).build();
        assert!(result.is_err());

        let result = ReportConfig::builder()
            .max_search_terms(0)
            .validate_online(false)
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ReportConfig::builder().api_key("secret-key").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("<redacted>"));
    }
}
