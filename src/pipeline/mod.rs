//! Pipeline stages for report generation.
//!
//! The pipeline is a fixed, strictly sequential chain: every stage reads the
//! output of the previous one from the shared [`crate::patient::ReportState`]
//! and writes exactly one new field. There is no branching and no concurrency
//! between stages — the whole value of the design is that each prompt builds
//! on the text the previous prompt produced.
//!
//! ## Data Flow
//!
//! ```text
//! retrieve ──▶ extract ──▶ reason ──▶ validate ──▶ compose
//!  (LLM)       (LLM)       (LLM)     (search)      (LLM)
//! ```
//!
//! 1. **Retrieve** — organise the raw patient fields into a structured summary
//! 2. **Extract**  — pull clinically significant findings from that summary
//! 3. **Reason**   — interpret the findings; risk assessment and follow-ups
//! 4. **Validate** — best-effort web lookups for reference ranges; the only
//!    stage with no LLM call and the only stage allowed to fail silently
//! 5. **Compose**  — the final patient-facing Markdown report

pub mod llm;
pub mod postprocess;
pub mod search;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Organise raw patient data into a structured summary.
    Retrieve,
    /// Extract critical findings and risk factors.
    Extract,
    /// Clinical interpretation and risk assessment.
    Reason,
    /// Web-search validation of key terms (no LLM call).
    Validate,
    /// Generate the final Markdown report.
    Compose,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::Retrieve,
        Stage::Extract,
        Stage::Reason,
        Stage::Validate,
        Stage::Compose,
    ];

    /// 0-based position in the execution order.
    pub fn index(self) -> usize {
        match self {
            Stage::Retrieve => 0,
            Stage::Extract => 1,
            Stage::Reason => 2,
            Stage::Validate => 3,
            Stage::Compose => 4,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Retrieve => write!(f, "data retrieval"),
            Stage::Extract => write!(f, "finding extraction"),
            Stage::Reason => write!(f, "clinical reasoning"),
            Stage::Validate => write!(f, "reference validation"),
            Stage::Compose => write!(f, "report composition"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_matches_index() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn stage_display_is_lowercase_prose() {
        assert_eq!(Stage::Compose.to_string(), "report composition");
        assert_eq!(Stage::Validate.to_string(), "reference validation");
    }
}
