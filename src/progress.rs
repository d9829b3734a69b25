//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn ReportProgressCallback>`] via
//! [`crate::config::ReportConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through its stages. Callbacks are the
//! least-invasive integration point: the CLI forwards them to a terminal
//! progress bar, a service could forward them to a WebSocket, and the
//! library knows nothing about either.
//!
//! The pipeline is strictly sequential, so callbacks are never invoked
//! concurrently; the `Send + Sync` bound exists only so the callback can be
//! shared behind an `Arc` across the async boundary.

use crate::pipeline::Stage;
use std::sync::Arc;

/// Called by the pipeline as it moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ReportProgressCallback: Send + Sync {
    /// Called once before the first stage.
    fn on_report_start(&self, _total_stages: usize) {}

    /// Called when a stage begins. `index` is 0-based.
    fn on_stage_start(&self, _stage: Stage, _index: usize, _total: usize) {}

    /// Called when a stage completes; `output_len` is the produced text
    /// length in bytes (zero for a validation stage with no matches).
    fn on_stage_complete(&self, _stage: Stage, _index: usize, _total: usize, _output_len: usize) {}

    /// Called when a stage fails after exhausting retries. The pipeline
    /// aborts after this event.
    fn on_stage_error(&self, _stage: Stage, _index: usize, _total: usize, _error: &str) {}

    /// Called once after the terminal stage.
    fn on_report_complete(&self, _total_stages: usize, _duration_ms: u64) {}
}

/// Convenience alias for a shared callback.
pub type ProgressCallback = Arc<dyn ReportProgressCallback>;
