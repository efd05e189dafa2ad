//! Core data models used throughout Lore.
//!
//! These types represent the source files, normalized candidates, and stored
//! entities that flow through the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Provenance sentinel recorded once a second channel confirms the same
/// natural key.
pub const MERGED_CHANNEL: &str = "both";

/// A source export file discovered by the directory scan, already hashed and
/// shape-probed.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub filename: String,
    /// SHA-256 of the file bytes; the manifest key.
    pub content_hash: String,
    /// Channel inferred from filename conventions.
    pub channel: String,
}

/// A normalized entity candidate produced by a source adapter, before the
/// upsert engine has resolved it against the store.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Externally meaningful unique id: URL, video id, GitHub node id, or a
    /// composite source:external-id string.
    pub natural_key: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub body: String,
    /// Event discrimination for activity rows (commit, issue_closed, ...).
    pub subkind: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Topic tags from keyword heuristics.
    pub tags: Vec<String>,
    /// Extracted repository cross-references (owner/repo).
    pub repo_refs: Vec<String>,
    pub metadata_json: String,
    pub raw_json: Option<String>,
}

impl Candidate {
    pub fn new(natural_key: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            natural_key: natural_key.into(),
            title: None,
            author: None,
            url: None,
            body: String::new(),
            subkind: None,
            created_at,
            tags: Vec::new(),
            repo_refs: Vec::new(),
            metadata_json: "{}".to_string(),
            raw_json: None,
        }
    }
}

/// Counters reported per file and per run by the upsert engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub seen: u64,
    pub inserted: u64,
    pub upgraded: u64,
    pub skipped: u64,
}

impl UpsertCounts {
    pub fn add(&mut self, other: UpsertCounts) {
        self.seen += other.seen;
        self.inserted += other.inserted;
        self.upgraded += other.upgraded;
        self.skipped += other.skipped;
    }
}

/// A single parsed subtitle caption.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// A merged transcript window covering one or more consecutive captions.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptWindow {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// A ranked hit returned by the retrieval engine.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub kind: String,
    pub natural_key: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub channel: String,
    pub created_at: i64,
    /// FTS rank (keyword mode) or similarity `1 - distance` (vector modes).
    pub score: f64,
    pub snippet: String,
}
