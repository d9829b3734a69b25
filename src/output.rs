//! Output types: per-stage results, run statistics, and the final report.

use crate::patient::ReportState;
use crate::pipeline::Stage;
use serde::{Deserialize, Serialize};

/// Result of one pipeline stage.
///
/// The validation stage produces a `StageResult` too — with zero token
/// counts — so the stage list always has five entries and downstream
/// accounting never needs to special-case it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Which stage produced this result.
    pub stage: Stage,
    /// The text the stage wrote into the state.
    pub output: String,
    /// Prompt tokens consumed (0 for the validation stage).
    pub input_tokens: u64,
    /// Completion tokens produced (0 for the validation stage).
    pub output_tokens: u64,
    /// Wall-clock duration of the stage including retries.
    pub duration_ms: u64,
    /// How many retries the stage needed (0 = first attempt succeeded).
    pub retries: u8,
}

/// Aggregate statistics for one report run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportStats {
    /// Number of stages executed (always 5 on success).
    pub stages_run: usize,
    /// Total prompt tokens across all LLM stages.
    pub total_input_tokens: u64,
    /// Total completion tokens across all LLM stages.
    pub total_output_tokens: u64,
    /// End-to-end wall-clock time.
    pub total_duration_ms: u64,
    /// Time spent inside inference calls.
    pub llm_duration_ms: u64,
    /// Time spent inside the search stage.
    pub search_duration_ms: u64,
    /// Whether the validation stage produced at least one reference.
    pub search_validated: bool,
}

/// The complete result of a report run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutput {
    /// The final Markdown report, post-processed.
    pub markdown: String,
    /// The full pipeline state, including intermediate stage outputs.
    pub state: ReportState,
    /// Per-stage results in execution order.
    pub stages: Vec<StageResult>,
    /// Aggregate statistics.
    pub stats: ReportStats,
}
