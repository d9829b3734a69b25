//! Patient input record and the write-once pipeline state.
//!
//! [`ReportState`] is the only value that flows between stages. It is an
//! accumulator, not a shared document: each stage writes exactly one field,
//! no stage ever rewrites an earlier field, and the whole record is moved
//! into [`crate::output::ReportOutput`] once the terminal stage finishes.
//! Keeping the fields private with `pub(crate)` setters makes the write-once
//! discipline a compile-time property of the crate rather than a convention.

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Structured patient-health input for one report run.
///
/// The free-text fields (`lab_results`, `genetic_data`, `medical_history`)
/// are passed to the prompts verbatim — the retrieval stage is what turns
/// them into a structured summary, so no parsing happens here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Patient display name, used in the report header.
    pub name: String,
    /// Age in years. Accepted range: 1–120.
    pub age: u32,
    /// Free-text lab results, one value per line.
    pub lab_results: String,
    /// Free-text genetic markers.
    pub genetic_data: String,
    /// Free-text medical history.
    pub medical_history: String,
}

impl PatientRecord {
    /// Validate the record before the pipeline starts.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.name.trim().is_empty() {
            return Err(ReportError::InvalidPatient(
                "patient name must not be empty".into(),
            ));
        }
        if self.age < 1 || self.age > 120 {
            return Err(ReportError::InvalidPatient(format!(
                "age must be 1-120 (got {})",
                self.age
            )));
        }
        Ok(())
    }
}

/// Write-once accumulator threaded through the pipeline.
///
/// Field write order mirrors stage order: `retrieved_data` →
/// `nlp_findings` → `clinical_reasoning` → `validated_info` →
/// `final_report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportState {
    patient: PatientRecord,
    retrieved_data: String,
    nlp_findings: String,
    clinical_reasoning: String,
    validated_info: String,
    final_report: String,
}

impl ReportState {
    /// Start a fresh state for one pipeline run.
    pub fn new(patient: PatientRecord) -> Self {
        Self {
            patient,
            retrieved_data: String::new(),
            nlp_findings: String::new(),
            clinical_reasoning: String::new(),
            validated_info: String::new(),
            final_report: String::new(),
        }
    }

    pub fn patient(&self) -> &PatientRecord {
        &self.patient
    }

    /// Structured summary produced by the retrieval stage.
    pub fn retrieved_data(&self) -> &str {
        &self.retrieved_data
    }

    /// Critical findings produced by the extraction stage.
    pub fn nlp_findings(&self) -> &str {
        &self.nlp_findings
    }

    /// Interpretation produced by the reasoning stage.
    pub fn clinical_reasoning(&self) -> &str {
        &self.clinical_reasoning
    }

    /// Reference snippets (or the placeholder) from the validation stage.
    pub fn validated_info(&self) -> &str {
        &self.validated_info
    }

    /// Final Markdown report from the composition stage.
    pub fn final_report(&self) -> &str {
        &self.final_report
    }

    pub(crate) fn set_retrieved_data(&mut self, text: String) {
        debug_assert!(self.retrieved_data.is_empty(), "retrieve stage ran twice");
        self.retrieved_data = text;
    }

    pub(crate) fn set_nlp_findings(&mut self, text: String) {
        debug_assert!(self.nlp_findings.is_empty(), "extract stage ran twice");
        self.nlp_findings = text;
    }

    pub(crate) fn set_clinical_reasoning(&mut self, text: String) {
        debug_assert!(self.clinical_reasoning.is_empty(), "reason stage ran twice");
        self.clinical_reasoning = text;
    }

    pub(crate) fn set_validated_info(&mut self, text: String) {
        debug_assert!(self.validated_info.is_empty(), "validate stage ran twice");
        self.validated_info = text;
    }

    pub(crate) fn set_final_report(&mut self, text: String) {
        debug_assert!(self.final_report.is_empty(), "compose stage ran twice");
        self.final_report = text;
    }
}
