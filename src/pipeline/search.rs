//! Best-effort web-search validation of clinical terms.
//!
//! The validation stage is the odd one out: it makes no inference call, and
//! it is the only stage allowed to fail. Any error from the search backend —
//! network, HTTP status, parse — is swallowed and replaced by a fixed
//! placeholder string, so the report always ships with or without
//! references. The [`SearchClient`] trait exists so tests can script
//! successes and failures without a network.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ReportConfig;

/// Text substituted for references when the search backend fails.
pub const UNVERIFIED_PLACEHOLDER: &str = "Unable to validate information online.";

/// Condition keywords and the reference-range query each one triggers.
///
/// Matching is a plain case-insensitive substring check against the
/// reasoning text — the goal is a handful of good lookups, not NLP.
const CONDITION_QUERIES: &[(&str, &str)] = &[
    ("diabetes", "diabetes HbA1c normal range"),
    ("cholesterol", "cholesterol levels normal range"),
    ("hypertension", "blood pressure normal range"),
    ("anemia", "hemoglobin normal range"),
    ("thyroid", "TSH normal range"),
];

/// Errors from a single search call. Never propagated past this module.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Search backend returned HTTP {0}")]
    Status(u16),

    #[error("Could not extract snippets from response")]
    NoSnippets,
}

/// A query-in, snippets-out search service.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Return up to `max_results` short text snippets for the query.
    async fn snippets(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError>;
}

// ── DuckDuckGo client ────────────────────────────────────────────────────

static RE_SNIPPET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</a>"#).unwrap()
});
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Search client backed by the DuckDuckGo HTML endpoint.
///
/// The HTML endpoint needs no API key, which matches the best-effort role
/// of this stage: a result is nice to have, an error is fine.
pub struct DuckDuckGoClient {
    base_url: String,
    client: reqwest::Client,
}

impl DuckDuckGoClient {
    pub fn new(timeout_secs: u64) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SearchError::Http(e.to_string()))?;
        Ok(Self {
            base_url: "https://html.duckduckgo.com".to_string(),
            client,
        })
    }

    /// Point the client at a different endpoint (tests only).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SearchClient for DuckDuckGoClient {
    async fn snippets(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        let url = format!("{}/html/", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        let snippets: Vec<String> = RE_SNIPPET
            .captures_iter(&html)
            .take(max_results)
            .map(|caps| strip_html(&caps[1]))
            .filter(|s| !s.is_empty())
            .collect();

        if snippets.is_empty() {
            return Err(SearchError::NoSnippets);
        }
        Ok(snippets)
    }
}

/// Remove tags and decode the handful of entities DuckDuckGo emits.
fn strip_html(fragment: &str) -> String {
    let text = RE_TAG.replace_all(fragment, "");
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Term extraction and stage execution ──────────────────────────────────

/// Extract reference-range queries for conditions mentioned in the
/// reasoning text, capped at `max_terms`.
pub fn extract_search_terms(reasoning: &str, max_terms: usize) -> Vec<String> {
    let lower = reasoning.to_lowercase();
    CONDITION_QUERIES
        .iter()
        .filter(|(keyword, _)| lower.contains(keyword))
        .map(|(_, query)| query.to_string())
        .take(max_terms)
        .collect()
}

/// Run the validation stage: look up each extracted term and format the
/// first snippet per term as a reference line.
///
/// Returns `(validated_info, validated)`. On any backend error the text is
/// the fixed placeholder and `validated` is false; with no matching terms
/// both are empty/false — the compose prompt simply omits references.
pub async fn run_validation(
    client: &dyn SearchClient,
    reasoning: &str,
    config: &ReportConfig,
) -> (String, bool) {
    let terms = extract_search_terms(reasoning, config.max_search_terms);
    if terms.is_empty() {
        debug!("no condition keywords found; skipping reference lookup");
        return (String::new(), false);
    }

    let mut validated_info = String::new();
    for term in &terms {
        match client.snippets(term, config.max_search_results).await {
            Ok(snippets) => {
                if let Some(first) = snippets.first() {
                    validated_info.push_str(&format!("Reference: {}...\n", truncate(first, 200)));
                }
            }
            Err(e) => {
                warn!("reference lookup failed for '{term}': {e}");
                return (UNVERIFIED_PLACEHOLDER.to_string(), false);
            }
        }
    }

    let validated = !validated_info.is_empty();
    (validated_info, validated)
}

/// Char-boundary-safe prefix.
fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_terms_for_mentioned_conditions() {
        let reasoning = "Findings consistent with Type 2 Diabetes; elevated cholesterol noted.";
        let terms = extract_search_terms(reasoning, 2);
        assert_eq!(
            terms,
            vec![
                "diabetes HbA1c normal range".to_string(),
                "cholesterol levels normal range".to_string()
            ]
        );
    }

    #[test]
    fn term_cap_is_enforced() {
        let reasoning = "diabetes cholesterol hypertension anemia thyroid";
        assert_eq!(extract_search_terms(reasoning, 2).len(), 2);
        assert_eq!(extract_search_terms(reasoning, 10).len(), 5);
    }

    #[test]
    fn no_keywords_yields_no_terms() {
        assert!(extract_search_terms("unremarkable panel", 2).is_empty());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let terms = extract_search_terms("HYPERTENSION suspected", 2);
        assert_eq!(terms, vec!["blood pressure normal range".to_string()]);
    }

    #[test]
    fn strip_html_removes_tags_and_entities() {
        let html = r#"The <b>normal</b> HbA1c range is &lt;5.7&#x27;s percent"#;
        assert_eq!(strip_html(html), "The normal HbA1c range is <5.7's percent");
    }

    #[test]
    fn snippet_regex_matches_result_markup() {
        let html = r#"<a class="result__snippet" href="/x">Normal <b>HbA1c</b> is below 5.7%.</a>"#;
        let caps = RE_SNIPPET.captures(html).unwrap();
        assert_eq!(strip_html(&caps[1]), "Normal HbA1c is below 5.7%.");
    }

    #[test]
    fn truncate_is_char_boundary_safe() {
        let s = "αβγδε";
        assert_eq!(truncate(s, 3), "αβγ");
        assert_eq!(truncate("short", 200), "short");
    }
}
