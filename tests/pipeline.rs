//! Integration tests for the report pipeline.
//!
//! A scripted stub stands in for the inference service and a canned client
//! for the search service, so every test is deterministic and offline:
//! the tests prove the pipeline threads state without loss, that search
//! failures degrade to the placeholder instead of erroring, and that the
//! renderer's layout pass is idempotent.

use async_trait::async_trait;
use medreport::{
    generate, generate_to_file, layout_blocks, render_pdf, Completion, CompletionOptions,
    PatientRecord, ProviderError, ReportConfig, ReportError, ReportProgressCallback, ReportStyle,
    SearchClient, SearchError, Stage, UNVERIFIED_PLACEHOLDER,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Returns its scripted outputs in call order and records every prompt.
struct ScriptedProvider {
    outputs: Vec<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(outputs: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl medreport::LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<Completion, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self
            .outputs
            .get(n)
            .cloned()
            .ok_or(ProviderError::EmptyResponse)?;
        Ok(Completion {
            text,
            prompt_tokens: 100,
            completion_tokens: 50,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Always fails, for exercising the fatal-stage path.
struct FailingProvider;

#[async_trait]
impl medreport::LlmProvider for FailingProvider {
    async fn complete(
        &self,
        _prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<Completion, ProviderError> {
        Err(ProviderError::Api {
            status: 503,
            body: "overloaded".into(),
        })
    }
}

/// Returns one canned snippet per query.
struct CannedSearch {
    snippet: String,
    queries: Mutex<Vec<String>>,
}

impl CannedSearch {
    fn new(snippet: &str) -> Arc<Self> {
        Arc::new(Self {
            snippet: snippet.to_string(),
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SearchClient for CannedSearch {
    async fn snippets(&self, query: &str, _max: usize) -> Result<Vec<String>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(vec![self.snippet.clone()])
    }
}

/// Always fails, for exercising the placeholder path.
struct FailingSearch;

#[async_trait]
impl SearchClient for FailingSearch {
    async fn snippets(&self, _query: &str, _max: usize) -> Result<Vec<String>, SearchError> {
        Err(SearchError::Status(503))
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn patient() -> PatientRecord {
    PatientRecord {
        name: "Jane Roe".into(),
        age: 45,
        lab_results: "HbA1c: 8.2% (Elevated)\nLDL: 160 mg/dL (High)".into(),
        genetic_data: "APOE4 variant present".into(),
        medical_history: "Type 2 Diabetes diagnosed 2020".into(),
    }
}

const RETRIEVED: &str = "STRUCTURED SUMMARY: HbA1c 8.2%, LDL 160, APOE4 positive, T2DM since 2020.";
const FINDINGS: &str = "CRITICAL FINDINGS: elevated HbA1c, high LDL cholesterol.";
const REASONING: &str = "INTERPRETATION: poorly controlled diabetes; moderate cardiovascular risk.";
// Already clean Markdown with a trailing newline, so post-processing is the
// identity and the equality assertion below is exact.
const FINAL_REPORT: &str = "# Health Report Summary\n\n**Patient:** Jane Roe\n\n## Key Findings\n\n- HbA1c elevated at 8.2%\n";

fn scripted() -> Arc<ScriptedProvider> {
    ScriptedProvider::new(&[RETRIEVED, FINDINGS, REASONING, FINAL_REPORT])
}

fn config_with(
    provider: Arc<ScriptedProvider>,
    search: Arc<dyn SearchClient>,
) -> ReportConfig {
    ReportConfig::builder()
        .provider(provider)
        .search_client(search)
        .max_retries(0)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

// ── State threading ──────────────────────────────────────────────────────────

#[tokio::test]
async fn final_output_equals_compose_stage_output() {
    let provider = scripted();
    let config = config_with(provider.clone(), CannedSearch::new("HbA1c below 5.7% is normal"));

    let output = generate(patient(), &config).await.unwrap();

    assert_eq!(output.markdown, FINAL_REPORT);
    assert_eq!(output.state.final_report(), FINAL_REPORT);
    assert_eq!(output.stats.stages_run, 5);
    // 4 LLM stages × scripted token counts; validate contributes zero.
    assert_eq!(output.stats.total_input_tokens, 400);
    assert_eq!(output.stats.total_output_tokens, 200);
}

#[tokio::test]
async fn each_prompt_embeds_previous_stage_output() {
    let provider = scripted();
    let config = config_with(provider.clone(), CannedSearch::new("reference text"));

    generate(patient(), &config).await.unwrap();

    let prompts = provider.recorded_prompts();
    assert_eq!(prompts.len(), 4);
    // Retrieval sees the raw patient fields
    assert!(prompts[0].contains("Jane Roe"));
    assert!(prompts[0].contains("HbA1c: 8.2% (Elevated)"));
    // Each later prompt embeds the prior stage's full output
    assert!(prompts[1].contains(RETRIEVED));
    assert!(prompts[2].contains(FINDINGS));
    assert!(prompts[3].contains(FINDINGS));
    assert!(prompts[3].contains(REASONING));
    // Compose also sees the formatted reference line
    assert!(prompts[3].contains("Reference: reference text..."));
}

#[tokio::test]
async fn stage_results_are_in_execution_order() {
    let provider = scripted();
    let config = config_with(provider, CannedSearch::new("x"));

    let output = generate(patient(), &config).await.unwrap();
    let order: Vec<Stage> = output.stages.iter().map(|s| s.stage).collect();
    assert_eq!(order, Stage::ALL.to_vec());
    assert_eq!(output.stages[0].output, RETRIEVED);
    assert_eq!(output.stages[4].output, FINAL_REPORT);
}

// ── Search degradation ───────────────────────────────────────────────────────

#[tokio::test]
async fn search_failure_degrades_to_placeholder() {
    let provider = scripted();
    let config = config_with(provider.clone(), Arc::new(FailingSearch));

    let output = generate(patient(), &config).await.unwrap();

    // The run still succeeds and the placeholder is threaded through.
    assert_eq!(output.markdown, FINAL_REPORT);
    assert_eq!(output.state.validated_info(), UNVERIFIED_PLACEHOLDER);
    assert!(!output.stats.search_validated);

    let prompts = provider.recorded_prompts();
    assert!(prompts[3].contains(UNVERIFIED_PLACEHOLDER));
}

#[tokio::test]
async fn search_terms_follow_reasoning_keywords() {
    let provider = scripted();
    let search = CannedSearch::new("snippet");
    let config = config_with(provider, search.clone());

    generate(patient(), &config).await.unwrap();

    // REASONING mentions "diabetes" and "cardiovascular" — only diabetes
    // is a known condition keyword.
    let queries = search.queries.lock().unwrap().clone();
    assert_eq!(queries, vec!["diabetes HbA1c normal range".to_string()]);
}

#[tokio::test]
async fn no_keyword_match_leaves_references_empty() {
    let provider = ScriptedProvider::new(&[
        RETRIEVED,
        FINDINGS,
        "All values within normal limits.",
        FINAL_REPORT,
    ]);
    let search = CannedSearch::new("snippet");
    let config = config_with(provider, search.clone());

    let output = generate(patient(), &config).await.unwrap();

    assert!(output.state.validated_info().is_empty());
    assert!(!output.stats.search_validated);
    assert!(search.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn validation_can_be_disabled() {
    let provider = scripted();
    let config = ReportConfig::builder()
        .provider(provider)
        .search_client(Arc::new(FailingSearch))
        .validate_online(false)
        .build()
        .unwrap();

    let output = generate(patient(), &config).await.unwrap();
    assert!(output.state.validated_info().is_empty());
    assert!(!output.stats.search_validated);
}

#[tokio::test]
async fn successful_validation_is_reported_in_stats() {
    let provider = scripted();
    let config = config_with(provider, CannedSearch::new("HbA1c below 5.7% is normal"));

    let output = generate(patient(), &config).await.unwrap();
    assert!(output.stats.search_validated);
    assert!(output.state.validated_info().starts_with("Reference: "));
}

// ── Failure paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn llm_failure_aborts_with_stage_error() {
    let config = ReportConfig::builder()
        .provider(Arc::new(FailingProvider))
        .search_client(Arc::new(FailingSearch))
        .max_retries(1)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    let err = generate(patient(), &config).await.unwrap_err();
    match err {
        ReportError::StageFailed { stage, detail, .. } => {
            assert_eq!(stage, Stage::Retrieve);
            assert!(detail.contains("503"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn invalid_patient_rejected_before_any_call() {
    let provider = scripted();
    let config = config_with(provider.clone(), CannedSearch::new("x"));

    let mut bad = patient();
    bad.age = 0;
    let err = generate(bad, &config).await.unwrap_err();
    assert!(matches!(err, ReportError::InvalidPatient(_)));
    assert!(provider.recorded_prompts().is_empty());
}

// ── Output paths ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn generate_to_file_writes_markdown_atomically() {
    let provider = scripted();
    let config = config_with(provider, CannedSearch::new("x"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.md");
    let stats = generate_to_file(patient(), &path, &config).await.unwrap();

    assert_eq!(stats.stages_run, 5);
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, FINAL_REPORT);
    // No stray temp file left behind
    assert!(!dir.path().join("report.md.tmp").exists());
}

#[tokio::test]
async fn progress_callback_sees_all_stages() {
    struct Counting {
        started: AtomicUsize,
        completed: AtomicUsize,
    }
    impl ReportProgressCallback for Counting {
        fn on_stage_start(&self, _s: Stage, _i: usize, _t: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_stage_complete(&self, _s: Stage, _i: usize, _t: usize, _len: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    let cb = Arc::new(Counting {
        started: AtomicUsize::new(0),
        completed: AtomicUsize::new(0),
    });
    let provider = scripted();
    let config = ReportConfig::builder()
        .provider(provider)
        .search_client(CannedSearch::new("x"))
        .progress_callback(cb.clone())
        .build()
        .unwrap();

    generate(patient(), &config).await.unwrap();
    assert_eq!(cb.started.load(Ordering::SeqCst), 5);
    assert_eq!(cb.completed.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn clinical_style_changes_compose_prompt_only() {
    let provider = scripted();
    let config = ReportConfig::builder()
        .provider(provider.clone())
        .search_client(CannedSearch::new("x"))
        .style(ReportStyle::Clinical)
        .build()
        .unwrap();

    generate(patient(), &config).await.unwrap();
    let prompts = provider.recorded_prompts();
    assert!(prompts[3].contains("# Medical Report"));
    assert!(prompts[0].contains("medical data retriever"));
}

// ── Rendering properties ─────────────────────────────────────────────────────

#[test]
fn document_layout_is_idempotent() {
    let blocks_a = layout_blocks(FINAL_REPORT);
    let blocks_b = layout_blocks(FINAL_REPORT);
    assert_eq!(blocks_a, blocks_b);
    assert!(!blocks_a.is_empty());
}

#[test]
fn rendered_document_is_a_pdf() {
    let bytes = render_pdf(FINAL_REPORT, "Jane Roe health report").unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}
