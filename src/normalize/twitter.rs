//! Tweet export adapter.
//!
//! Handles bookmark and like exports. The same tweet frequently arrives from
//! both channels; the natural key is the tweet URL, so the upsert engine
//! merges the second arrival into `"both"` provenance.

use anyhow::Result;
use serde_json::Value;

use super::{derive_fields, parse_array, parse_time, SourceAdapter};
use crate::models::Candidate;

pub struct TwitterAdapter;

impl SourceAdapter for TwitterAdapter {
    fn kind(&self) -> &'static str {
        "tweet"
    }

    fn channel_for_filename(&self, filename: &str) -> String {
        if filename.to_lowercase().contains("like") {
            "like".to_string()
        } else {
            "bookmark".to_string()
        }
    }

    fn probe(&self, first: &Value) -> bool {
        first.get("url").is_some() && first.get("text").is_some()
    }

    fn parse(&self, content: &str) -> Result<Vec<Candidate>> {
        let items = parse_array(content)?;
        let mut candidates = Vec::with_capacity(items.len());

        for item in items {
            let Some(url) = item.get("url").and_then(Value::as_str) else {
                continue;
            };
            let text = item
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let created = parse_time(item.get("created_at"));

            let mut candidate = Candidate::new(url, created);
            candidate.url = Some(url.to_string());
            candidate.body = text.to_string();
            candidate.author = item
                .get("author")
                .or_else(|| item.get("screen_name"))
                .and_then(Value::as_str)
                .map(str::to_string);
            candidate.raw_json = Some(item.to_string());
            derive_fields(&mut candidate);
            candidates.push(candidate);
        }

        Ok(candidates)
    }
}
