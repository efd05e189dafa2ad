//! Coding-agent session export adapter.
//!
//! Sessions count toward the daily aggregates (one `session` subkind row per
//! session) and their summaries are searchable like any other entity.

use anyhow::Result;
use serde_json::Value;

use super::{derive_fields, parse_array, parse_time, SourceAdapter};
use crate::models::Candidate;

pub struct SessionsAdapter;

impl SourceAdapter for SessionsAdapter {
    fn kind(&self) -> &'static str {
        "session"
    }

    fn channel_for_filename(&self, _filename: &str) -> String {
        "agent".to_string()
    }

    fn probe(&self, first: &Value) -> bool {
        first.get("id").is_some() && first.get("started_at").is_some()
    }

    fn parse(&self, content: &str) -> Result<Vec<Candidate>> {
        let items = parse_array(content)?;
        let mut candidates = Vec::with_capacity(items.len());

        for item in items {
            let Some(id) = item.get("id").and_then(Value::as_str) else {
                continue;
            };
            let created = parse_time(item.get("started_at"));

            let mut candidate = Candidate::new(format!("session:{}", id), created);
            candidate.subkind = Some("session".to_string());
            candidate.title = item
                .get("project")
                .and_then(Value::as_str)
                .map(str::to_string);
            candidate.author = item
                .get("agent")
                .and_then(Value::as_str)
                .map(str::to_string);
            candidate.body = item
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            candidate.raw_json = Some(item.to_string());
            derive_fields(&mut candidate);
            candidates.push(candidate);
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session() {
        let adapter = SessionsAdapter;
        let content = r#"[
            {"id": "s-42", "started_at": "2024-05-20T14:00:00Z",
             "project": "lore", "agent": "codex", "summary": "Refactored the sqlite migrations"}
        ]"#;
        let candidates = adapter.parse(content).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].natural_key, "session:s-42");
        assert_eq!(candidates[0].subkind.as_deref(), Some("session"));
        assert_eq!(candidates[0].title.as_deref(), Some("lore"));
    }
}
