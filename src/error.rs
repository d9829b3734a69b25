//! Error types for the medreport library.
//!
//! [`ReportError`] covers fatal failures only: anything that stops the report
//! from being produced at all (missing credentials, a stage exhausting its
//! retries, an unwritable output path). Search failures are deliberately NOT
//! represented here — the validation stage swallows them and substitutes a
//! placeholder string, so a flaky search backend can never sink a report.

use crate::pipeline::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the medreport library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Credential errors ─────────────────────────────────────────────────
    /// No LLM provider could be resolved: no injected provider, no API key in
    /// the config, and no `GEMINI_API_KEY` in the environment.
    #[error("No inference credentials found.\n{hint}")]
    MissingApiKey { hint: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The supplied patient record failed validation.
    #[error("Invalid patient record: {0}")]
    InvalidPatient(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// An LLM stage failed after all retries. Since every stage feeds the
    /// next, the pipeline cannot continue past a failed stage.
    #[error("Stage '{stage}' failed after {retries} retries: {detail}")]
    StageFailed {
        stage: Stage,
        retries: u32,
        detail: String,
    },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// PDF rendering failed (font setup or document serialisation).
    #[error("PDF rendering failed: {0}")]
    RenderFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
