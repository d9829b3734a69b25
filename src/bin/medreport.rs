//! CLI binary for medreport.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ReportConfig`, shows per-stage progress, and writes results.

use anyhow::{Context, Result};
use clap::Parser;
use medreport::{
    generate, generate_to_file, render_pdf_to_file, PatientRecord, ProgressCallback, ReportConfig,
    ReportProgressCallback, ReportStyle, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a five-slot progress bar with a per-stage
/// log line as each stage finishes.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(Stage::ALL.len() as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:30.green/238}] {pos}/{len} stages  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        bar.set_style(style);
        bar.set_prefix("Generating");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }
}

impl ReportProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, index: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(index, Instant::now());
        self.bar.set_message(stage.to_string());
    }

    fn on_stage_complete(&self, stage: Stage, index: usize, _total: usize, output_len: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} {:<22}  {:<12}  {}",
            green("✓"),
            stage,
            dim(&format!("{output_len:>5} chars")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_stage_error(&self, stage: Stage, _index: usize, _total: usize, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {:<22}  {}", red("✗"), stage, red(&msg)));
    }

    fn on_report_complete(&self, _total_stages: usize, duration_ms: u64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Report generated in {:.1}s",
            green("✔"),
            duration_ms as f64 / 1000.0
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic report (stdout), patient fields inline
  medreport --name "Jane Roe" --age 45 \
      --labs "HbA1c: 8.2% (Elevated)" \
      --genetics "APOE4 variant present" \
      --history "Type 2 Diabetes diagnosed 2020"

  # Patient record from a JSON file, write Markdown and PDF
  medreport --patient patient.json -o report.md --pdf report.pdf

  # Concise clinical style, no online validation
  medreport --patient patient.json --style clinical --no-search

  # Structured JSON output (full pipeline state and stats)
  medreport --patient patient.json --json > report.json

PATIENT JSON FORMAT:
  {
    "name": "Jane Roe",
    "age": 45,
    "lab_results": "HbA1c: 8.2% (Elevated)\nLDL: 160 mg/dL (High)",
    "genetic_data": "APOE4 variant present",
    "medical_history": "Type 2 Diabetes diagnosed 2020"
  }

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY        Gemini API key (required unless --api-key is given)
  MEDREPORT_MODEL       Override model ID (default: gemini-2.0-flash)

SETUP:
  1. Set API key:   export GEMINI_API_KEY=...
  2. Generate:      medreport --patient patient.json -o report.md
"#;

/// Generate narrative patient health reports using staged LLM prompts.
#[derive(Parser, Debug)]
#[command(
    name = "medreport",
    version,
    about = "Generate narrative patient health reports from labs, genetics, and history",
    long_about = "Generate a narrative patient health report from structured input \
(demographics, lab values, genetic markers, medical history) via a fixed sequence of \
LLM prompts, with optional web-search validation of reference ranges and PDF output.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to a patient record JSON file (see PATIENT JSON FORMAT below).
    #[arg(long, conflicts_with_all = ["name", "age", "labs", "genetics", "history"])]
    patient: Option<PathBuf>,

    /// Patient name.
    #[arg(long, required_unless_present = "patient")]
    name: Option<String>,

    /// Patient age in years (1-120).
    #[arg(long, required_unless_present = "patient",
          value_parser = clap::value_parser!(u32).range(1..=120))]
    age: Option<u32>,

    /// Free-text lab results.
    #[arg(long, default_value = "")]
    labs: String,

    /// Free-text genetic markers.
    #[arg(long, default_value = "")]
    genetics: String,

    /// Free-text medical history.
    #[arg(long, default_value = "")]
    history: String,

    /// Write the Markdown report to this file instead of stdout.
    #[arg(short, long, env = "MEDREPORT_OUTPUT")]
    output: Option<PathBuf>,

    /// Also render the report to a PDF at this path.
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Inference model ID.
    #[arg(long, env = "MEDREPORT_MODEL")]
    model: Option<String>,

    /// Gemini API key (overrides GEMINI_API_KEY).
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Report style: patient-friendly or clinical.
    #[arg(long, value_enum, default_value = "patient-friendly")]
    style: StyleArg,

    /// Sampling temperature (0.0-2.0).
    #[arg(long, env = "MEDREPORT_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max model output tokens per stage.
    #[arg(long, env = "MEDREPORT_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Retries per stage on inference failure.
    #[arg(long, env = "MEDREPORT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Skip the online reference-validation stage.
    #[arg(long, env = "MEDREPORT_NO_SEARCH")]
    no_search: bool,

    /// Per-inference-call timeout in seconds.
    #[arg(long, env = "MEDREPORT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Output structured JSON (full ReportOutput) instead of Markdown.
    #[arg(long, env = "MEDREPORT_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "MEDREPORT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MEDREPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the report itself.
    #[arg(short, long, env = "MEDREPORT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum StyleArg {
    PatientFriendly,
    Clinical,
}

impl From<StyleArg> for ReportStyle {
    fn from(v: StyleArg) -> Self {
        match v {
            StyleArg::PatientFriendly => ReportStyle::PatientFriendly,
            StyleArg::Clinical => ReportStyle::Clinical,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the bar provides the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Load patient record ──────────────────────────────────────────────
    let patient = load_patient(&cli).await?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ReportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run pipeline ─────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = generate_to_file(patient.clone(), output_path, &config)
            .await
            .context("Report generation failed")?;

        if let Some(ref pdf_path) = cli.pdf {
            // Reuse the just-written Markdown rather than paying for a
            // second pipeline run.
            let markdown = tokio::fs::read_to_string(output_path)
                .await
                .context("Failed to re-read Markdown output")?;
            let title = format!("{} health report", patient.name);
            render_pdf_to_file(&markdown, &title, pdf_path).context("PDF rendering failed")?;
        }

        if !cli.quiet {
            eprintln!(
                "{}  {} tokens in / {} out  {}ms  →  {}",
                green("✔"),
                dim(&stats.total_input_tokens.to_string()),
                dim(&stats.total_output_tokens.to_string()),
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            if let Some(ref pdf_path) = cli.pdf {
                eprintln!("   {} {}", cyan("⎙"), pdf_path.display());
            }
        }
    } else {
        let output = generate(patient.clone(), &config)
            .await
            .context("Report generation failed")?;

        if let Some(ref pdf_path) = cli.pdf {
            let title = format!("{} health report", patient.name);
            render_pdf_to_file(&output.markdown, &title, pdf_path)
                .context("PDF rendering failed")?;
        }

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.markdown.as_bytes())
                .context("Failed to write to stdout")?;
            if !output.markdown.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }

        if !cli.quiet && !cli.json {
            eprintln!(
                "   {} tokens in  /  {} tokens out  —  {}ms total",
                dim(&output.stats.total_input_tokens.to_string()),
                dim(&output.stats.total_output_tokens.to_string()),
                output.stats.total_duration_ms,
            );
            if !output.stats.search_validated {
                eprintln!("   {}", dim("references: not validated online"));
            }
        }
    }

    Ok(())
}

/// Load the patient record from --patient JSON or from the inline flags.
async fn load_patient(cli: &Cli) -> Result<PatientRecord> {
    if let Some(ref path) = cli.patient {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read patient file {path:?}"))?;
        let patient: PatientRecord = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse patient JSON in {path:?}"))?;
        return Ok(patient);
    }

    // clap guarantees name/age are present when --patient is absent.
    Ok(PatientRecord {
        name: cli.name.clone().unwrap_or_default(),
        age: cli.age.unwrap_or_default(),
        lab_results: cli.labs.clone(),
        genetic_data: cli.genetics.clone(),
        medical_history: cli.history.clone(),
    })
}

/// Map CLI args to `ReportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReportConfig> {
    let mut builder = ReportConfig::builder()
        .style(cli.style.clone().into())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .validate_online(!cli.no_search)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
