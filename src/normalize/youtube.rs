//! YouTube saved-item export adapter.
//!
//! Liked videos and watch-later videos are separate export files over the
//! same video population; the filename selects the channel.

use anyhow::Result;
use serde_json::Value;

use super::{derive_fields, parse_array, parse_time, SourceAdapter};
use crate::models::Candidate;

pub struct YoutubeAdapter;

impl SourceAdapter for YoutubeAdapter {
    fn kind(&self) -> &'static str {
        "video"
    }

    fn channel_for_filename(&self, filename: &str) -> String {
        let lower = filename.to_lowercase();
        if lower.contains("watch-later") || lower.contains("watch_later") {
            "watch_later".to_string()
        } else {
            "liked".to_string()
        }
    }

    fn probe(&self, first: &Value) -> bool {
        first.get("videoId").is_some() && first.get("title").is_some()
    }

    fn parse(&self, content: &str) -> Result<Vec<Candidate>> {
        let items = parse_array(content)?;
        let mut candidates = Vec::with_capacity(items.len());

        for item in items {
            let Some(video_id) = item.get("videoId").and_then(Value::as_str) else {
                continue;
            };
            let created = parse_time(item.get("savedAt").or_else(|| item.get("publishedAt")));

            let mut candidate = Candidate::new(video_id, created);
            candidate.title = item
                .get("title")
                .and_then(Value::as_str)
                .map(str::to_string);
            candidate.author = item
                .get("channelTitle")
                .and_then(Value::as_str)
                .map(str::to_string);
            candidate.url = Some(format!("https://www.youtube.com/watch?v={}", video_id));
            candidate.body = item
                .get("description")
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
    fn test_channel_from_filename() {
        let adapter = YoutubeAdapter;
        assert_eq!(adapter.channel_for_filename("watch-later.json"), "watch_later");
        assert_eq!(adapter.channel_for_filename("liked-videos.json"), "liked");
        assert_eq!(adapter.channel_for_filename("saved.json"), "liked");
    }

    #[test]
    fn test_parse() {
        let adapter = YoutubeAdapter;
        let content = r#"[
            {"videoId": "abc123", "title": "Intro to Rust", "channelTitle": "RustConf", "savedAt": "2024-01-15T08:00:00Z"}
        ]"#;
        let candidates = adapter.parse(content).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].natural_key, "abc123");
        assert_eq!(
            candidates[0].url.as_deref(),
            Some("https://www.youtube.com/watch?v=abc123")
        );
        assert!(candidates[0].tags.contains(&"rust".to_string()));
    }
}
