//! GitHub export adapters: activity events and starred repositories.
//!
//! Both export kinds land in the same directory; each adapter's shape probe
//! picks out its own files. Events feed the daily aggregates through their
//! `subkind`; stars are searchable entities in their own right.

use anyhow::Result;
use serde_json::Value;

use super::{derive_fields, parse_array, parse_time, SourceAdapter};
use crate::models::Candidate;

pub struct GithubEventsAdapter;

impl SourceAdapter for GithubEventsAdapter {
    fn kind(&self) -> &'static str {
        "event"
    }

    fn channel_for_filename(&self, _filename: &str) -> String {
        "github".to_string()
    }

    fn probe(&self, first: &Value) -> bool {
        first.get("id").is_some() && first.get("type").is_some()
    }

    fn parse(&self, content: &str) -> Result<Vec<Candidate>> {
        let items = parse_array(content)?;
        let mut candidates = Vec::with_capacity(items.len());

        for item in items {
            let Some(id) = item.get("id").and_then(Value::as_str) else {
                continue;
            };
            let event_type = item
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("UnknownEvent");
            let repo = item
                .pointer("/repo/name")
                .and_then(Value::as_str)
                .unwrap_or("");
            let created = parse_time(item.get("created_at"));

            let mut candidate = Candidate::new(format!("gh-event:{}", id), created);
            candidate.subkind = Some(event_subkind(event_type, &item).to_string());
            candidate.title = Some(if repo.is_empty() {
                event_type.to_string()
            } else {
                format!("{} on {}", event_type, repo)
            });
            candidate.author = item
                .pointer("/actor/login")
                .and_then(Value::as_str)
                .map(str::to_string);
            candidate.body = event_body(&item);
            if !repo.is_empty() {
                candidate.url = Some(format!("https://github.com/{}", repo));
            }
            candidate.raw_json = Some(item.to_string());
            derive_fields(&mut candidate);
            if !repo.is_empty() && !candidate.repo_refs.contains(&repo.to_string()) {
                candidate.repo_refs.push(repo.to_string());
            }
            candidates.push(candidate);
        }

        Ok(candidates)
    }
}

/// Map a raw event type onto the activity subkinds the aggregates count.
fn event_subkind(event_type: &str, item: &Value) -> &'static str {
    match event_type {
        "PushEvent" => "commit",
        "IssuesEvent" => {
            if item.pointer("/payload/action").and_then(Value::as_str) == Some("closed") {
                "issue_closed"
            } else {
                "issue"
            }
        }
        "PullRequestEvent" => {
            let merged = item
                .pointer("/payload/pull_request/merged")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if merged {
                "pr_merged"
            } else {
                "pr"
            }
        }
        _ => "other",
    }
}

/// Free-text body for the event: commit messages for pushes, title for
/// issues/PRs.
fn event_body(item: &Value) -> String {
    if let Some(commits) = item.pointer("/payload/commits").and_then(Value::as_array) {
        return commits
            .iter()
            .filter_map(|c| c.get("message").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");
    }
    for pointer in ["/payload/issue/title", "/payload/pull_request/title"] {
        if let Some(title) = item.pointer(pointer).and_then(Value::as_str) {
            return title.to_string();
        }
    }
    String::new()
}

pub struct GithubStarsAdapter;

impl SourceAdapter for GithubStarsAdapter {
    fn kind(&self) -> &'static str {
        "repo"
    }

    fn channel_for_filename(&self, _filename: &str) -> String {
        "starred".to_string()
    }

    fn probe(&self, first: &Value) -> bool {
        first.get("node_id").is_some() && first.get("full_name").is_some()
    }

    fn parse(&self, content: &str) -> Result<Vec<Candidate>> {
        let items = parse_array(content)?;
        let mut candidates = Vec::with_capacity(items.len());

        for item in items {
            let Some(node_id) = item.get("node_id").and_then(Value::as_str) else {
                continue;
            };
            let full_name = item
                .get("full_name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let created = parse_time(item.get("starred_at").or_else(|| item.get("created_at")));

            let mut candidate = Candidate::new(node_id, created);
            candidate.title = Some(full_name.to_string());
            candidate.author = item
                .pointer("/owner/login")
                .and_then(Value::as_str)
                .map(str::to_string);
            candidate.url = item
                .get("html_url")
                .and_then(Value::as_str)
                .map(str::to_string);
            candidate.body = item
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if let Some(language) = item.get("language").and_then(Value::as_str) {
                candidate.metadata_json =
                    serde_json::json!({ "language": language }).to_string();
            }
            candidate.raw_json = Some(item.to_string());
            derive_fields(&mut candidate);
            if !full_name.is_empty() && !candidate.repo_refs.contains(&full_name.to_string()) {
                candidate.repo_refs.push(full_name.to_string());
            }
            candidates.push(candidate);
        }

        Ok(candidates)
    }
}
