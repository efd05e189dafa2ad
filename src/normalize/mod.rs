//! Per-source normalization adapters.
//!
//! Every export kind (tweets, saved videos, GitHub events, starred repos,
//! agent sessions) implements [`SourceAdapter`], so the manifest-check →
//! parse → upsert pipeline in [`crate::ingest`] exists exactly once. An
//! adapter owns its natural keys, its shape probe, its filename→channel
//! convention, and how records become [`Candidate`]s.

pub mod github;
pub mod sessions;
pub mod twitter;
pub mod youtube;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::Candidate;

pub trait SourceAdapter {
    /// Entity kind this adapter produces (`tweet`, `video`, ...).
    fn kind(&self) -> &'static str;

    /// Channel inferred from filename conventions.
    fn channel_for_filename(&self, filename: &str) -> String;

    /// Shape probe over the first array element. Files failing the probe are
    /// excluded from the candidate set at scan time, not reported as errors.
    fn probe(&self, first: &Value) -> bool;

    /// Parse a whole export file into ordered candidates.
    fn parse(&self, content: &str) -> Result<Vec<Candidate>>;
}

/// Deterministic keyword-containment topic rules, applied to lowercased
/// text. Tags are not mutually exclusive and carry no ranking.
const TOPIC_RULES: &[(&str, &[&str])] = &[
    ("rust", &["rust", "cargo", "borrow checker", "rustc"]),
    (
        "ai",
        &["llm", "gpt", "claude", "embedding", "machine learning", "neural", "agent"],
    ),
    ("database", &["sqlite", "postgres", "database", "sql", "duckdb"]),
    (
        "web",
        &["javascript", "typescript", "react", "css", "frontend", "browser"],
    ),
    ("devops", &["docker", "kubernetes", "terraform", "deploy", "ci/cd"]),
    ("security", &["vulnerability", "exploit", "cve-", "encryption"]),
];

pub fn infer_tags(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOPIC_RULES
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

/// Extract `http(s)://` URLs by whitespace tokenization, trimming trailing
/// punctuation.
pub fn extract_urls(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|tok| tok.trim_start_matches(['(', '"', '\'', '<']))
        .filter(|tok| tok.starts_with("http://") || tok.starts_with("https://"))
        .map(|tok| tok.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '"', '\'']))
        .filter(|tok| !tok.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract `owner/repo` cross-references from any github.com URLs.
pub fn extract_repo_refs(urls: &[String]) -> Vec<String> {
    let mut refs = Vec::new();
    for url in urls {
        let Some(rest) = url.split("github.com/").nth(1) else {
            continue;
        };
        let mut segments = rest.split('/');
        let (Some(owner), Some(repo)) = (segments.next(), segments.next()) else {
            continue;
        };
        let repo = repo.trim_end_matches(".git");
        if owner.is_empty() || repo.is_empty() {
            continue;
        }
        let full = format!("{}/{}", owner, repo);
        if !refs.contains(&full) {
            refs.push(full);
        }
    }
    refs
}

/// Parse an export timestamp: RFC 3339 string or unix seconds. Falls back to
/// the epoch so malformed timestamps stay deterministic rather than ingesting
/// as "now".
pub fn parse_time(value: Option<&Value>) -> DateTime<Utc> {
    let fallback = DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default();
    let Some(value) = value else {
        return fallback;
    };
    if let Some(s) = value.as_str() {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return dt.with_timezone(&Utc);
        }
        // Twitter's legacy format: "Wed Oct 10 20:19:24 +0000 2018"
        if let Ok(dt) = DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y") {
            return dt.with_timezone(&Utc);
        }
        return fallback;
    }
    if let Some(secs) = value.as_i64() {
        return DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(fallback);
    }
    fallback
}

/// Parse a JSON export into its top-level array.
pub fn parse_array(content: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(content)?;
    match value {
        Value::Array(items) => Ok(items),
        _ => anyhow::bail!("export is not a JSON array"),
    }
}

/// Fill the derived fields (tags, urls, repo refs) shared by all adapters.
pub fn derive_fields(candidate: &mut Candidate) {
    let mut text = candidate.body.clone();
    if let Some(title) = &candidate.title {
        text.push(' ');
        text.push_str(title);
    }
    candidate.tags = infer_tags(&text);
    let urls = extract_urls(&text);
    candidate.repo_refs = extract_repo_refs(&urls);
}
