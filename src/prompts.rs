//! Prompt templates for every pipeline stage.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the pipeline's behaviour is almost entirely
//!    defined by these strings; changing what a stage does means editing
//!    exactly one function.
//!
//! 2. **Testability** — unit tests can build and inspect prompts directly
//!    without a live inference service, so a regression that drops a patient
//!    field from a prompt is caught immediately.
//!
//! Each builder takes only the state fields its stage is allowed to see,
//! which documents the data flow in the function signatures.

use crate::config::ReportStyle;
use crate::patient::PatientRecord;

/// Prompt for the retrieval stage: organise raw patient fields into a
/// structured summary, as a medical data retriever would.
pub fn retrieve_prompt(patient: &PatientRecord) -> String {
    format!(
        "As a medical data retriever, organize and structure the following patient information:\n\
         \n\
         Patient: {name}, Age: {age}\n\
         Lab Results: {labs}\n\
         Genetic Data: {genetics}\n\
         Medical History: {history}\n\
         \n\
         Provide a structured summary of all available data.",
        name = patient.name,
        age = patient.age,
        labs = patient.lab_results,
        genetics = patient.genetic_data,
        history = patient.medical_history,
    )
}

/// Prompt for the extraction stage: pull clinically significant findings
/// out of the structured summary.
pub fn extract_prompt(retrieved_data: &str) -> String {
    format!(
        "As a medical NLP specialist, analyze the following patient data and extract:\n\
         1. Critical lab abnormalities\n\
         2. Significant genetic markers\n\
         3. Key medical history points\n\
         4. Risk factors\n\
         \n\
         Patient Data: {retrieved_data}\n\
         \n\
         Focus on clinically significant findings only."
    )
}

/// Prompt for the reasoning stage: interpret the extracted findings.
pub fn reason_prompt(nlp_findings: &str) -> String {
    format!(
        "As a clinical reasoning specialist, interpret these findings:\n\
         \n\
         {nlp_findings}\n\
         \n\
         Provide:\n\
         1. Clinical interpretation of abnormal values\n\
         2. Risk assessment (low/moderate/high)\n\
         3. Potential diagnoses or conditions to monitor\n\
         4. Recommended follow-up actions\n\
         \n\
         Be precise and evidence-based."
    )
}

/// Prompt for the composition stage.
///
/// Two variants exist because the report serves two audiences: a
/// patient-friendly narrative with soft language, and a concise clinical
/// summary that forbids filler and only emits sections backed by data.
/// `report_date` is passed in rather than computed here so prompt content
/// stays deterministic under test.
pub fn compose_prompt(
    style: ReportStyle,
    patient: &PatientRecord,
    nlp_findings: &str,
    clinical_reasoning: &str,
    validated_info: &str,
    report_date: &str,
) -> String {
    match style {
        ReportStyle::PatientFriendly => format!(
            "Generate a comprehensive, patient-friendly health report for:\n\
             Patient: {name}\n\
             Age: {age}\n\
             Report Date: {date}\n\
             \n\
             Based on:\n\
             Clinical Findings: {findings}\n\
             Medical Reasoning: {reasoning}\n\
             Validated References: {references}\n\
             \n\
             Structure the report with:\n\
             # Health Report Summary\n\
             **Date:** {date}\n\
             **Patient:** {name}\n\
             **Age:** {age}\n\
             \n\
             ## Key Findings\n\
             ## Risk Assessment\n\
             ## Recommendations\n\
             ## Next Steps\n\
             \n\
             Use clear, understandable language while maintaining medical accuracy.",
            name = patient.name,
            age = patient.age,
            date = report_date,
            findings = nlp_findings,
            reasoning = clinical_reasoning,
            references = validated_info,
        ),
        ReportStyle::Clinical => format!(
            "Generate a CONCISE, SPECIFIC medical report. Only include sections with actual findings.\n\
             \n\
             Patient: {name}\n\
             Age: {age}\n\
             Report Date: {date}\n\
             \n\
             Clinical Findings: {findings}\n\
             Medical Analysis: {reasoning}\n\
             Validated Info: {references}\n\
             \n\
             STRICT REQUIREMENTS:\n\
             - Be factual and specific - NO generic encouragement or support statements\n\
             - Only include sections that have actual data/findings\n\
             - Use exact values and ranges\n\
             - Focus on medical facts only\n\
             \n\
             Structure (only include sections with data):\n\
             # Medical Report\n\
             **Date:** {date}\n\
             **Patient:** {name}\n\
             **Age:** {age}\n\
             \n\
             ## Lab Results Analysis\n\
             (Only if abnormal values found)\n\
             \n\
             ## Risk Factors\n\
             (Only if specific risks identified)\n\
             \n\
             ## Clinical Recommendations\n\
             (Only specific, actionable medical recommendations)",
            name = patient.name,
            age = patient.age,
            date = report_date,
            findings = nlp_findings,
            reasoning = clinical_reasoning,
            references = validated_info,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient() -> PatientRecord {
        PatientRecord {
            name: "Jane Roe".into(),
            age: 45,
            lab_results: "Glucose: 180 mg/dL (High)".into(),
            genetic_data: "BRCA1: Negative".into(),
            medical_history: "Hypertension".into(),
        }
    }

    #[test]
    fn retrieve_prompt_carries_every_field() {
        let p = retrieve_prompt(&patient());
        assert!(p.contains("Jane Roe"));
        assert!(p.contains("Age: 45"));
        assert!(p.contains("Glucose: 180 mg/dL (High)"));
        assert!(p.contains("BRCA1: Negative"));
        assert!(p.contains("Hypertension"));
    }

    #[test]
    fn extract_prompt_embeds_prior_output() {
        let p = extract_prompt("structured summary text");
        assert!(p.contains("structured summary text"));
        assert!(p.contains("Risk factors"));
    }

    #[test]
    fn reason_prompt_embeds_prior_output() {
        let p = reason_prompt("HbA1c elevated");
        assert!(p.contains("HbA1c elevated"));
        assert!(p.contains("Risk assessment"));
    }

    #[test]
    fn compose_prompt_patient_friendly_has_section_skeleton() {
        let p = compose_prompt(
            ReportStyle::PatientFriendly,
            &patient(),
            "findings",
            "reasoning",
            "Reference: normal range...",
            "August 23, 2026",
        );
        assert!(p.contains("# Health Report Summary"));
        assert!(p.contains("## Next Steps"));
        assert!(p.contains("August 23, 2026"));
        assert!(p.contains("Reference: normal range..."));
    }

    #[test]
    fn compose_prompt_clinical_forbids_filler() {
        let p = compose_prompt(
            ReportStyle::Clinical,
            &patient(),
            "findings",
            "reasoning",
            "",
            "August 23, 2026",
        );
        assert!(p.contains("NO generic encouragement"));
        assert!(p.contains("# Medical Report"));
        assert!(!p.contains("## Next Steps"));
    }
}
