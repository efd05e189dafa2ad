//! Ingestion pipeline orchestration.
//!
//! One generic flow for every source kind: scan → manifest check → parse →
//! deduplicating upsert → manifest write. Each file is processed inside a
//! single transaction and its manifest entry is persisted immediately after
//! the commit, so a crash mid-run loses at most one file's progress and a
//! re-run resumes from the next unprocessed file.

use anyhow::{bail, Result};
use chrono::TimeZone;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::aggregate;
use crate::config::{Config, SourceDirConfig};
use crate::db;
use crate::manifest;
use crate::models::{Candidate, SourceFile, UpsertCounts, MERGED_CHANNEL};
use crate::normalize::github::{GithubEventsAdapter, GithubStarsAdapter};
use crate::normalize::sessions::SessionsAdapter;
use crate::normalize::twitter::TwitterAdapter;
use crate::normalize::youtube::YoutubeAdapter;
use crate::normalize::SourceAdapter;
use crate::scan;
use crate::vtt;

pub async fn run_sync(config: &Config, source: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let mut totals = UpsertCounts::default();
    let mut files_done = 0u64;
    let mut files_skipped = 0u64;

    let known = ["twitter", "youtube", "github", "sessions", "transcripts"];
    let selected: Vec<&str> = if source == "all" {
        known.to_vec()
    } else if known.contains(&source) {
        vec![source]
    } else {
        bail!(
            "Unknown source: '{}'. Available: all, twitter, youtube, github, sessions, transcripts",
            source
        );
    };

    for name in selected {
        let outcome = sync_source(config, &pool, name).await?;
        totals.add(outcome.counts);
        files_done += outcome.files_processed;
        files_skipped += outcome.files_skipped;
    }

    println!("sync {}", source);
    println!("  files processed: {}", files_done);
    println!("  files already in manifest: {}", files_skipped);
    println!("  records seen: {}", totals.seen);
    println!("  inserted: {}", totals.inserted);
    println!("  upgraded: {}", totals.upgraded);
    println!("  skipped: {}", totals.skipped);
    println!("ok");

    pool.close().await;
    Ok(())
}

struct SyncOutcome {
    counts: UpsertCounts,
    files_processed: u64,
    files_skipped: u64,
}

async fn sync_source(config: &Config, pool: &SqlitePool, name: &str) -> Result<SyncOutcome> {
    let mut outcome = SyncOutcome {
        counts: UpsertCounts::default(),
        files_processed: 0,
        files_skipped: 0,
    };

    // Each source is optional; `sync all` quietly passes over unconfigured
    // ones.
    let (dir, adapters): (&SourceDirConfig, Vec<Box<dyn SourceAdapter>>) = match name {
        "twitter" => match &config.sources.twitter {
            Some(dir) => (dir, vec![Box::new(TwitterAdapter)]),
            None => return Ok(outcome),
        },
        "youtube" => match &config.sources.youtube {
            Some(dir) => (dir, vec![Box::new(YoutubeAdapter)]),
            None => return Ok(outcome),
        },
        "github" => match &config.sources.github {
            // Events and stars share a directory; the scan probes each file
            // against both and routes it to whichever claims it.
            Some(dir) => (
                dir,
                vec![
                    Box::new(GithubEventsAdapter) as Box<dyn SourceAdapter>,
                    Box::new(GithubStarsAdapter),
                ],
            ),
            None => return Ok(outcome),
        },
        "sessions" => match &config.sources.sessions {
            Some(dir) => (dir, vec![Box::new(SessionsAdapter)]),
            None => return Ok(outcome),
        },
        "transcripts" => {
            let Some(dir) = &config.sources.transcripts else {
                return Ok(outcome);
            };
            return sync_transcripts(config, pool, dir).await;
        }
        other => bail!("Unknown source: {}", other),
    };

    let refs: Vec<&dyn SourceAdapter> = adapters.iter().map(|a| a.as_ref()).collect();
    for (adapter_idx, file) in scan::scan_exports(dir, &refs)? {
        let adapter = refs[adapter_idx];

        if manifest::is_processed(pool, &file.content_hash).await? {
            outcome.files_skipped += 1;
            continue;
        }

        match process_file(config, pool, adapter, &file).await {
            Ok(counts) => {
                println!(
                    "  {} [{}]: {} seen, {} inserted, {} upgraded, {} skipped",
                    file.filename,
                    file.channel,
                    counts.seen,
                    counts.inserted,
                    counts.upgraded,
                    counts.skipped
                );
                outcome.counts.add(counts);
                outcome.files_processed += 1;
            }
            // A failed file is not marked processed; the next run
            // retries it. Committed files stay committed.
            Err(e) => eprintln!("Warning: failed to process {}: {}", file.filename, e),
        }
    }

    Ok(outcome)
}

async fn process_file(
    config: &Config,
    pool: &SqlitePool,
    adapter: &dyn SourceAdapter,
    file: &SourceFile,
) -> Result<UpsertCounts> {
    let content = std::fs::read_to_string(&file.path)?;
    let candidates = adapter.parse(&content)?;

    let counts = upsert_candidates(pool, adapter.kind(), &file.channel, &candidates).await?;
    manifest::record_processed(
        pool,
        &file.content_hash,
        &file.filename,
        adapter.kind(),
        &file.channel,
        counts,
    )
    .await?;

    // Activity rows feed the contribution aggregates; recompute every date
    // this file touched.
    if matches!(adapter.kind(), "event" | "session") {
        let mut dates: Vec<String> = candidates
            .iter()
            .map(|c| c.created_at.format("%Y-%m-%d").to_string())
            .collect();
        dates.sort();
        dates.dedup();
        for date in dates {
            aggregate::recalculate(config, pool, &date).await?;
        }
    }

    Ok(counts)
}

/// Resolve a batch of candidates against the store inside one all-or-nothing
/// transaction.
///
/// Per candidate, by natural key: absent → insert with this channel's
/// provenance; present under a different, not-yet-merged channel → upgrade
/// provenance to the merged sentinel (and nothing else; content is
/// first-write-wins); otherwise no write. Lookup order follows input order.
pub async fn upsert_candidates(
    pool: &SqlitePool,
    kind: &str,
    channel: &str,
    candidates: &[Candidate],
) -> Result<UpsertCounts> {
    let mut tx = pool.begin().await?;
    let mut counts = UpsertCounts::default();
    let now = chrono::Utc::now().timestamp();

    for candidate in candidates {
        counts.seen += 1;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT channel FROM entities WHERE kind = ? AND natural_key = ?")
                .bind(kind)
                .bind(&candidate.natural_key)
                .fetch_optional(&mut *tx)
                .await?;

        match existing {
            None => {
                let id = Uuid::new_v4().to_string();
                sqlx::query(
                    r#"
                    INSERT INTO entities (id, kind, natural_key, title, author, url, body,
                                          subkind, channel, created_at, ingested_at,
                                          tags_json, refs_json, metadata_json, raw_json)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&id)
                .bind(kind)
                .bind(&candidate.natural_key)
                .bind(&candidate.title)
                .bind(&candidate.author)
                .bind(&candidate.url)
                .bind(&candidate.body)
                .bind(&candidate.subkind)
                .bind(channel)
                .bind(candidate.created_at.timestamp())
                .bind(now)
                .bind(serde_json::to_string(&candidate.tags)?)
                .bind(serde_json::to_string(&candidate.repo_refs)?)
                .bind(&candidate.metadata_json)
                .bind(&candidate.raw_json)
                .execute(&mut *tx)
                .await?;

                let fts_text = match &candidate.title {
                    Some(title) => format!("{}\n{}", title, candidate.body),
                    None => candidate.body.clone(),
                };
                sqlx::query("INSERT INTO entities_fts (entity_id, kind, text) VALUES (?, ?, ?)")
                    .bind(&id)
                    .bind(kind)
                    .bind(fts_text)
                    .execute(&mut *tx)
                    .await?;

                counts.inserted += 1;
            }
            Some(stored) if stored != channel && stored != MERGED_CHANNEL => {
                sqlx::query(
                    "UPDATE entities SET channel = ? WHERE kind = ? AND natural_key = ?",
                )
                .bind(MERGED_CHANNEL)
                .bind(kind)
                .bind(&candidate.natural_key)
                .execute(&mut *tx)
                .await?;
                counts.upgraded += 1;
            }
            Some(_) => {
                counts.skipped += 1;
            }
        }
    }

    tx.commit().await?;
    Ok(counts)
}

async fn sync_transcripts(
    config: &Config,
    pool: &SqlitePool,
    dir: &SourceDirConfig,
) -> Result<SyncOutcome> {
    let mut outcome = SyncOutcome {
        counts: UpsertCounts::default(),
        files_processed: 0,
        files_skipped: 0,
    };

    for file in scan::scan_vtt(dir)? {
        if manifest::is_processed(pool, &file.content_hash).await? {
            outcome.files_skipped += 1;
            continue;
        }

        let content = std::fs::read_to_string(&file.path)?;
        let captions = vtt::parse_vtt(&content);
        if captions.is_empty() {
            // No-op, not an error; the file stays out of the manifest so a
            // fixed version gets picked up.
            eprintln!("Warning: no parseable captions in {}", file.filename);
            continue;
        }

        let candidates = transcript_candidates(config, &file, &captions)?;
        match upsert_candidates(pool, "transcript", &file.channel, &candidates).await {
            Ok(counts) => {
                manifest::record_processed(
                    pool,
                    &file.content_hash,
                    &file.filename,
                    "transcript",
                    &file.channel,
                    counts,
                )
                .await?;
                println!(
                    "  {}: {} seen, {} inserted, {} skipped",
                    file.filename, counts.seen, counts.inserted, counts.skipped
                );
                outcome.counts.add(counts);
                outcome.files_processed += 1;
            }
            Err(e) => eprintln!("Warning: failed to process {}: {}", file.filename, e),
        }
    }

    Ok(outcome)
}

/// Build transcript candidates: one whole-transcript entity when the content
/// fits under the chunking threshold, fixed-duration windows otherwise.
fn transcript_candidates(
    config: &Config,
    file: &SourceFile,
    captions: &[crate::models::Caption],
) -> Result<Vec<Candidate>> {
    // Video id by filename convention: everything before the first dot
    // ("dQw4w9WgXcQ.en.vtt" → "dQw4w9WgXcQ").
    let video_id = file
        .filename
        .split('.')
        .next()
        .unwrap_or(&file.filename)
        .to_string();

    let modified = std::fs::metadata(&file.path)
        .and_then(|m| m.modified())
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
    let modified_secs = modified
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    let created = chrono::Utc
        .timestamp_opt(modified_secs, 0)
        .single()
        .unwrap_or_default();

    let duration = vtt::total_duration(captions);
    let mut candidates = Vec::new();

    if duration <= config.transcripts.chunk_threshold_secs {
        let mut candidate = Candidate::new(format!("yt:{}:transcript", video_id), created);
        candidate.title = Some(format!("Transcript of {}", video_id));
        candidate.url = Some(format!("https://www.youtube.com/watch?v={}", video_id));
        candidate.body = vtt::full_text(captions);
        crate::normalize::derive_fields(&mut candidate);
        candidates.push(candidate);
        return Ok(candidates);
    }

    for window in vtt::window_captions(captions, config.transcripts.window_secs) {
        let start = window.start_secs as i64;
        let mut candidate = Candidate::new(format!("yt:{}:t{}", video_id, start), created);
        candidate.title = Some(format!("Transcript of {} at {}s", video_id, start));
        candidate.url = Some(format!(
            "https://www.youtube.com/watch?v={}&t={}",
            video_id, start
        ));
        candidate.body = window.text;
        candidate.metadata_json = serde_json::json!({
            "start_secs": window.start_secs,
            "end_secs": window.end_secs,
        })
        .to_string();
        crate::normalize::derive_fields(&mut candidate);
        candidates.push(candidate);
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Caption;

    fn test_config(threshold: f64, window: f64) -> Config {
        Config {
            db: crate::config::DbConfig {
                path: std::path::PathBuf::from(":memory:"),
            },
            sources: Default::default(),
            embedding: Default::default(),
            transcripts: crate::config::TranscriptConfig {
                chunk_threshold_secs: threshold,
                window_secs: window,
            },
            retrieval: Default::default(),
            aggregates: Default::default(),
        }
    }

    fn test_file() -> SourceFile {
        SourceFile {
            path: std::path::PathBuf::from("/nonexistent/dQw4w9WgXcQ.en.vtt"),
            filename: "dQw4w9WgXcQ.en.vtt".to_string(),
            content_hash: "0".repeat(64),
            channel: "transcript".to_string(),
        }
    }

    #[test]
    fn test_transcript_under_threshold_is_single_candidate() {
        let captions = vec![
            Caption { start_secs: 0.0, end_secs: 5.0, text: "hello".into() },
            Caption { start_secs: 5.0, end_secs: 8.0, text: "there".into() },
        ];
        let config = test_config(10.0, 10.0);
        let candidates = transcript_candidates(&config, &test_file(), &captions).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].natural_key, "yt:dQw4w9WgXcQ:transcript");
        assert_eq!(candidates[0].body, "hello there");
    }

    #[test]
    fn test_transcript_over_threshold_is_windowed() {
        let captions = vec![
            Caption { start_secs: 0.0, end_secs: 5.0, text: "hello".into() },
            Caption { start_secs: 5.0, end_secs: 12.0, text: "world".into() },
            Caption { start_secs: 12.0, end_secs: 15.0, text: "again".into() },
        ];
        let config = test_config(10.0, 10.0);
        let candidates = transcript_candidates(&config, &test_file(), &captions).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].natural_key, "yt:dQw4w9WgXcQ:t0");
        assert_eq!(candidates[0].body, "hello world");
        assert_eq!(candidates[1].natural_key, "yt:dQw4w9WgXcQ:t12");
        assert_eq!(candidates[1].body, "again");
        // Coverage: window bodies concatenate to the full transcript.
        let joined: Vec<&str> = candidates.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(joined.join(" "), "hello world again");
    }
}
