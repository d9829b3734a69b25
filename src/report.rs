//! Eager (full-report) generation entry points.
//!
//! [`generate`] runs the whole pipeline and returns only when the final
//! report is assembled. The five stages are strictly sequential — each
//! prompt embeds the previous stage's output, so there is nothing to
//! parallelise. The only stage that is allowed to fail is reference
//! validation, which degrades to a placeholder; any LLM stage failure
//! aborts the run.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::output::{ReportOutput, ReportStats, StageResult};
use crate::patient::{PatientRecord, ReportState};
use crate::pipeline::{llm, postprocess, search, Stage};
use crate::prompts;
use crate::provider::resolve_provider;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Generate a health report for one patient.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// - [`ReportError::MissingApiKey`] before any stage runs, if no provider
///   can be resolved
/// - [`ReportError::InvalidPatient`] for out-of-range input
/// - [`ReportError::StageFailed`] if an LLM stage exhausts its retries
///
/// Search failures never surface as errors; see
/// [`crate::pipeline::search`].
pub async fn generate(
    patient: PatientRecord,
    config: &ReportConfig,
) -> Result<ReportOutput, ReportError> {
    let total_start = Instant::now();
    patient.validate()?;

    // Credentials are checked before the first stage so a misconfigured run
    // halts immediately with a user-visible message.
    let provider = resolve_provider(config)?;
    info!(
        "Starting report generation for '{}' via {}",
        patient.name,
        provider.name()
    );

    let total = Stage::ALL.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_report_start(total);
    }

    let mut state = ReportState::new(patient);
    let mut stages: Vec<StageResult> = Vec::with_capacity(total);
    let mut llm_duration_ms = 0u64;

    // ── Stage 1: Retrieve ────────────────────────────────────────────────
    let prompt = prompts::retrieve_prompt(state.patient());
    let result = run_llm_stage(&provider, Stage::Retrieve, &prompt, config, total).await?;
    llm_duration_ms += result.duration_ms;
    state.set_retrieved_data(result.output.clone());
    stages.push(result);

    // ── Stage 2: Extract ─────────────────────────────────────────────────
    let prompt = prompts::extract_prompt(state.retrieved_data());
    let result = run_llm_stage(&provider, Stage::Extract, &prompt, config, total).await?;
    llm_duration_ms += result.duration_ms;
    state.set_nlp_findings(result.output.clone());
    stages.push(result);

    // ── Stage 3: Reason ──────────────────────────────────────────────────
    let prompt = prompts::reason_prompt(state.nlp_findings());
    let result = run_llm_stage(&provider, Stage::Reason, &prompt, config, total).await?;
    llm_duration_ms += result.duration_ms;
    state.set_clinical_reasoning(result.output.clone());
    stages.push(result);

    // ── Stage 4: Validate (search, best-effort) ──────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Validate, Stage::Validate.index(), total);
    }
    let search_start = Instant::now();
    let (validated_info, search_validated) = if config.validate_online {
        match config.search_client.clone() {
            Some(client) => {
                search::run_validation(client.as_ref(), state.clinical_reasoning(), config).await
            }
            None => match search::DuckDuckGoClient::new(config.search_timeout_secs) {
                Ok(client) => {
                    search::run_validation(&client, state.clinical_reasoning(), config).await
                }
                // Client construction failing is a search failure like any
                // other: swallow it and ship the placeholder.
                Err(_) => (search::UNVERIFIED_PLACEHOLDER.to_string(), false),
            },
        }
    } else {
        debug!("online validation disabled");
        (String::new(), false)
    };
    let search_duration_ms = search_start.elapsed().as_millis() as u64;
    state.set_validated_info(validated_info.clone());
    let validate_result = StageResult {
        stage: Stage::Validate,
        output: validated_info,
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: search_duration_ms,
        retries: 0,
    };
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(
            Stage::Validate,
            Stage::Validate.index(),
            total,
            validate_result.output.len(),
        );
    }
    stages.push(validate_result);

    // ── Stage 5: Compose ─────────────────────────────────────────────────
    let report_date = chrono::Local::now().format("%B %d, %Y").to_string();
    let prompt = prompts::compose_prompt(
        config.style,
        state.patient(),
        state.nlp_findings(),
        state.clinical_reasoning(),
        state.validated_info(),
        &report_date,
    );
    let result = run_llm_stage(&provider, Stage::Compose, &prompt, config, total).await?;
    llm_duration_ms += result.duration_ms;
    state.set_final_report(result.output.clone());
    stages.push(result);

    // ── Assemble ─────────────────────────────────────────────────────────
    let markdown = postprocess::tidy_markdown(state.final_report());

    let stats = ReportStats {
        stages_run: stages.len(),
        total_input_tokens: stages.iter().map(|s| s.input_tokens).sum(),
        total_output_tokens: stages.iter().map(|s| s.output_tokens).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        llm_duration_ms,
        search_duration_ms,
        search_validated,
    };

    info!(
        "Report complete: {} stages, {} tokens in / {} out, {}ms",
        stats.stages_run,
        stats.total_input_tokens,
        stats.total_output_tokens,
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_report_complete(total, stats.total_duration_ms);
    }

    Ok(ReportOutput {
        markdown,
        state,
        stages,
        stats,
    })
}

/// Generate a report and write the Markdown to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn generate_to_file(
    patient: PatientRecord,
    output_path: impl AsRef<Path>,
    config: &ReportConfig,
) -> Result<ReportStats, ReportError> {
    let output = generate(patient, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ReportError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, &output.markdown)
        .await
        .map_err(|e| ReportError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ReportError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.stats)
}

/// Generate a report and write the rendered PDF to a file.
pub async fn generate_pdf_to_file(
    patient: PatientRecord,
    output_path: impl AsRef<Path>,
    config: &ReportConfig,
) -> Result<ReportStats, ReportError> {
    let title = format!("{} health report", patient.name);
    let output = generate(patient, config).await?;
    crate::render::render_pdf_to_file(&output.markdown, &title, output_path)?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    patient: PatientRecord,
    config: &ReportConfig,
) -> Result<ReportOutput, ReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReportError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(generate(patient, config))
}

/// Run one LLM stage with progress events around it.
async fn run_llm_stage(
    provider: &std::sync::Arc<dyn crate::provider::LlmProvider>,
    stage: Stage,
    prompt: &str,
    config: &ReportConfig,
    total: usize,
) -> Result<StageResult, ReportError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage, stage.index(), total);
    }
    match llm::complete_stage(provider, stage, prompt, config).await {
        Ok(result) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_stage_complete(stage, stage.index(), total, result.output.len());
            }
            Ok(result)
        }
        Err(e) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_stage_error(stage, stage.index(), total, &e.to_string());
            }
            Err(e)
        }
    }
}
