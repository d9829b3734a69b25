//! Deterministic cleanup of model-generated Markdown.
//!
//! Well-prompted models still occasionally wrap the whole report in
//! ` ```markdown ` fences, emit CRLF line endings, or leave zero-width
//! characters behind. These six string rules fix the mechanical quirks
//! without touching content, keeping the compose prompt focused on what to
//! write rather than on formatting edge-cases.
//!
//! Every rule is the identity on already-clean input, so running the
//! pipeline against a well-behaved model (or a test stub) returns the model
//! text unchanged apart from a guaranteed trailing newline.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to raw model output, in order:
///
/// 1. Strip an outer ```markdown fence wrapping the whole document
/// 2. Normalise CRLF / lone CR line endings to LF
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of 3+ blank lines down to 2
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Ensure the document ends with exactly one newline
pub fn tidy_markdown(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let s = trim_line_ends(&s);
    let s = collapse_blank_runs(&s);
    let s = strip_invisible(&s);
    ensure_single_trailing_newline(&s)
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown)?\n(.*)\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn trim_line_ends(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for line in input.split('\n') {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    // split('\n') yields one extra empty segment for trailing newlines;
    // the final-newline rule settles the ending either way.
    out.pop();
    out
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_runs(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n\n").to_string()
}

fn strip_invisible(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

fn ensure_single_trailing_newline(input: &str) -> String {
    let trimmed = input.trim_end_matches('\n');
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{trimmed}\n")
    }
}
