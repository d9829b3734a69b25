//! Inference calls with retry/backoff.
//!
//! This module is intentionally thin — all prompt engineering lives in
//! [`crate::prompts`] so it can be changed without touching the retry logic
//! here, and the provider wire format lives in [`crate::provider`].
//!
//! ## Retry Strategy
//!
//! 429/503-class errors from inference APIs are transient and common.
//! Exponential backoff (`retry_backoff_ms * 2^(attempt-1)`) keeps the total
//! wait bounded: with the 500 ms default and 3 retries the sequence is
//! 500 ms → 1 s → 2 s, under 4 s of back-off per stage.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::output::StageResult;
use crate::pipeline::Stage;
use crate::provider::{CompletionOptions, LlmProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Run one LLM stage: send the prompt, retry on failure, return the result.
///
/// Unlike a per-page document pipeline, a failed stage here is fatal —
/// every later prompt embeds this stage's output, so there is nothing
/// useful to continue with. Exhausted retries surface as
/// [`ReportError::StageFailed`].
pub async fn complete_stage(
    provider: &Arc<dyn LlmProvider>,
    stage: Stage,
    prompt: &str,
    config: &ReportConfig,
) -> Result<StageResult, ReportError> {
    let start = Instant::now();
    let options = build_options(config);

    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "{stage}: retry {attempt}/{} after {backoff}ms",
                config.max_retries
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match provider.complete(prompt, &options).await {
            Ok(completion) => {
                let duration = start.elapsed();
                debug!(
                    "{stage}: {} prompt tokens, {} completion tokens, {:?}",
                    completion.prompt_tokens, completion.completion_tokens, duration
                );

                return Ok(StageResult {
                    stage,
                    output: completion.text,
                    input_tokens: completion.prompt_tokens,
                    output_tokens: completion.completion_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt as u8,
                });
            }
            Err(e) => {
                let err_msg = e.to_string();
                warn!("{stage}: attempt {} failed — {err_msg}", attempt + 1);
                last_err = Some(err_msg);
            }
        }
    }

    Err(ReportError::StageFailed {
        stage,
        retries: config.max_retries,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

/// Build `CompletionOptions` from the report config.
fn build_options(config: &ReportConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Completion, ProviderError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn build_options_defaults() {
        let config = ReportConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.3));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    /// Fails `failures` times, then succeeds.
    struct FlakyProvider {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<Completion, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ProviderError::Http("connection reset".into()))
            } else {
                Ok(Completion {
                    text: "recovered".into(),
                    prompt_tokens: 1,
                    completion_tokens: 1,
                })
            }
        }
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let provider: Arc<dyn LlmProvider> = Arc::new(FlakyProvider {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let config = ReportConfig::builder()
            .max_retries(3)
            .retry_backoff_ms(1)
            .build()
            .unwrap();

        let result = complete_stage(&provider, Stage::Retrieve, "p", &config)
            .await
            .unwrap();
        assert_eq!(result.output, "recovered");
        assert_eq!(result.retries, 2);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_stage_failure() {
        let provider: Arc<dyn LlmProvider> = Arc::new(FlakyProvider {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let config = ReportConfig::builder()
            .max_retries(1)
            .retry_backoff_ms(1)
            .build()
            .unwrap();

        let err = complete_stage(&provider, Stage::Reason, "p", &config)
            .await
            .unwrap_err();
        match err {
            ReportError::StageFailed {
                stage,
                retries,
                detail,
            } => {
                assert_eq!(stage, Stage::Reason);
                assert_eq!(retries, 1);
                assert!(detail.contains("connection reset"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
