//! Content-hash manifest store.
//!
//! Tracks which export files have already been processed, keyed by the
//! SHA-256 of the file bytes. A hash present in the manifest is never
//! reprocessed; re-ingesting a file requires deleting its entry or changing
//! the file's bytes. Entries are written once per file, immediately after
//! that file's upsert transaction commits, so a crash mid-run loses at most
//! one file's progress.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::models::UpsertCounts;

pub async fn is_processed(pool: &SqlitePool, content_hash: &str) -> Result<bool> {
    let found: Option<String> =
        sqlx::query_scalar("SELECT content_hash FROM manifest WHERE content_hash = ?")
            .bind(content_hash)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

pub async fn record_processed(
    pool: &SqlitePool,
    content_hash: &str,
    filename: &str,
    kind: &str,
    channel: &str,
    counts: UpsertCounts,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO manifest (content_hash, filename, kind, channel, processed_at, seen, inserted, upgraded, skipped)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(content_hash) DO UPDATE SET
            filename = excluded.filename,
            processed_at = excluded.processed_at,
            seen = excluded.seen,
            inserted = excluded.inserted,
            upgraded = excluded.upgraded,
            skipped = excluded.skipped
        "#,
    )
    .bind(content_hash)
    .bind(filename)
    .bind(kind)
    .bind(channel)
    .bind(now)
    .bind(counts.seen as i64)
    .bind(counts.inserted as i64)
    .bind(counts.upgraded as i64)
    .bind(counts.skipped as i64)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn entry_count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM manifest")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
