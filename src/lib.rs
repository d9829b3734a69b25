//! # medreport
//!
//! Generate narrative patient health reports from structured health input
//! (demographics, lab values, genetic markers, medical history) using a
//! fixed sequence of LLM prompts, with optional web-search validation and
//! PDF rendering.
//!
//! ## Why this crate?
//!
//! Raw lab printouts and genetic panels are unreadable to most patients.
//! This crate turns them into a structured narrative by chaining five
//! specialised prompts, each one consuming the previous prompt's output —
//! a retrieval pass, a findings-extraction pass, a clinical-reasoning pass,
//! a best-effort reference lookup, and a final composition pass.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PatientRecord
//!  │
//!  ├─ 1. Retrieve  organise raw fields into a structured summary (LLM)
//!  ├─ 2. Extract   critical findings and risk factors (LLM)
//!  ├─ 3. Reason    clinical interpretation + risk assessment (LLM)
//!  ├─ 4. Validate  reference-range lookups via web search (best-effort)
//!  ├─ 5. Compose   final Markdown report (LLM)
//!  └─ Output       Markdown + per-stage stats, optional PDF
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medreport::{generate, PatientRecord, ReportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider resolved from GEMINI_API_KEY
//!     let config = ReportConfig::default();
//!     let patient = PatientRecord {
//!         name: "Jane Roe".into(),
//!         age: 45,
//!         lab_results: "HbA1c: 8.2% (Elevated)".into(),
//!         genetic_data: "APOE4 variant present".into(),
//!         medical_history: "Type 2 Diabetes diagnosed 2020".into(),
//!     };
//!     let output = generate(patient, &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!(
//!         "tokens: {} in / {} out",
//!         output.stats.total_input_tokens, output.stats.total_output_tokens
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `medreport` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! medreport = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod patient;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod render;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ReportConfig, ReportConfigBuilder, ReportStyle};
pub use error::ReportError;
pub use output::{ReportOutput, ReportStats, StageResult};
pub use patient::{PatientRecord, ReportState};
pub use pipeline::search::{SearchClient, SearchError, UNVERIFIED_PLACEHOLDER};
pub use pipeline::Stage;
pub use progress::{ProgressCallback, ReportProgressCallback};
pub use provider::{Completion, CompletionOptions, GeminiProvider, LlmProvider, ProviderError};
pub use render::{layout_blocks, render_pdf, render_pdf_to_file, Block};
pub use report::{generate, generate_pdf_to_file, generate_sync, generate_to_file};
