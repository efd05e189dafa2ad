//! Embedding backfill scheduler.
//!
//! Entities become searchable semantically only once a vector exists for
//! them; the mapping table (`vector_map`) is the sole source of truth for
//! "has embedding", so re-running after a partial failure re-selects exactly
//! the entities still missing a row, with no retry bookkeeping. Each invocation
//! is capped (`max_items`) and groups are separated by a fixed delay, so a
//! large backlog drains across repeated invocations instead of one unbounded
//! call.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider, RemoteProvider};

/// Hard cap on the text blob sent per entity, to bound provider request cost
/// and latency.
const EMBED_TEXT_MAX_CHARS: usize = 8000;

struct PendingEntity {
    kind: String,
    natural_key: String,
    text: String,
}

/// Entities with no vector for the given model.
pub async fn pending_count(pool: &SqlitePool, model: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM entities e
        LEFT JOIN vector_map m
            ON m.kind = e.kind AND m.natural_key = e.natural_key AND m.model = ?
        WHERE m.vector_id IS NULL
        "#,
    )
    .bind(model)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn run_backfill(
    config: &Config,
    max_items: Option<usize>,
    batch_size_override: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = RemoteProvider::new(&config.embedding)?;
    let model = provider.model_name().to_string();
    let pool = db::connect(config).await?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);

    let total_pending = pending_count(&pool, &model).await?;

    if dry_run {
        println!("embed pending (dry-run)");
        println!("  entities needing embeddings: {}", total_pending);
        pool.close().await;
        return Ok(());
    }

    if total_pending == 0 {
        println!("embed pending");
        println!("  all entities embedded");
        pool.close().await;
        return Ok(());
    }

    let pending = select_pending(&pool, &model, max_items).await?;
    let mut embedded = 0u64;
    let mut failed = 0u64;

    let mut first = true;
    for group in pending.chunks(batch_size) {
        if !first {
            tokio::time::sleep(Duration::from_millis(config.embedding.inter_batch_delay_ms))
                .await;
        }
        first = false;

        let texts: Vec<String> = group.iter().map(|p| p.text.clone()).collect();

        match embedding::embed_texts(&config.embedding, &texts).await {
            // A wrong-dimension vector would store fine and then compare as
            // similarity 0 forever; reject the group instead.
            Ok(vectors) => match wrong_dims(&vectors, provider.dims()) {
                Some(got) => {
                    eprintln!(
                        "Warning: embedding batch failed: provider returned {} dims, expected {}",
                        got,
                        provider.dims()
                    );
                    failed += group.len() as u64;
                }
                None => {
                    write_group(&pool, &provider, group, &vectors).await?;
                    embedded += group.len() as u64;
                }
            },
            // A failed group stays pending; the next invocation retries it.
            Err(e) => {
                eprintln!("Warning: embedding batch failed: {}", e);
                failed += group.len() as u64;
            }
        }
    }

    let remaining = pending_count(&pool, &model).await?;
    println!("embed pending");
    println!("  total pending: {}", total_pending);
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);
    println!("  remaining: {}", remaining);

    pool.close().await;
    Ok(())
}

/// Most recent first, so fresh content becomes searchable soonest.
async fn select_pending(
    pool: &SqlitePool,
    model: &str,
    max_items: Option<usize>,
) -> Result<Vec<PendingEntity>> {
    // SQLite treats LIMIT -1 as unlimited.
    let limit = max_items.map(|n| n as i64).unwrap_or(-1);

    let rows = sqlx::query(
        r#"
        SELECT e.kind, e.natural_key, e.title, e.body
        FROM entities e
        LEFT JOIN vector_map m
            ON m.kind = e.kind AND m.natural_key = e.natural_key AND m.model = ?
        WHERE m.vector_id IS NULL
        ORDER BY e.created_at DESC
        LIMIT ?
        "#,
    )
    .bind(model)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let pending = rows
        .iter()
        .map(|row| {
            let title: Option<String> = row.get("title");
            let body: String = row.get("body");
            PendingEntity {
                kind: row.get("kind"),
                natural_key: row.get("natural_key"),
                text: build_embedding_text(title.as_deref(), &body),
            }
        })
        .collect();

    Ok(pending)
}

/// Length of the first vector that does not match the configured dimension.
fn wrong_dims(vectors: &[Vec<f32>], dims: usize) -> Option<usize> {
    vectors.iter().map(Vec::len).find(|&len| len != dims)
}

/// Concatenate the salient text fields, capped at [`EMBED_TEXT_MAX_CHARS`]
/// on a character boundary.
fn build_embedding_text(title: Option<&str>, body: &str) -> String {
    let mut text = String::new();
    if let Some(title) = title {
        text.push_str(title);
        if !body.is_empty() {
            text.push('\n');
        }
    }
    text.push_str(body);

    if text.chars().count() > EMBED_TEXT_MAX_CHARS {
        text = text.chars().take(EMBED_TEXT_MAX_CHARS).collect();
    }
    text
}

/// One transaction per group: vector rows are appended, mapping rows point
/// at them. Entities never reference vectors directly.
async fn write_group(
    pool: &SqlitePool,
    provider: &dyn EmbeddingProvider,
    group: &[PendingEntity],
    vectors: &[Vec<f32>],
) -> Result<()> {
    let mut tx = pool.begin().await?;
    let now = chrono::Utc::now().timestamp();

    for (entity, vector) in group.iter().zip(vectors.iter()) {
        let blob = embedding::vec_to_blob(vector);
        let vector_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO vectors (embedding, model, dims, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&blob)
        .bind(provider.model_name())
        .bind(provider.dims() as i64)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO vector_map (kind, natural_key, vector_id, model)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(kind, natural_key) DO UPDATE SET
                vector_id = excluded.vector_id,
                model = excluded.model
            "#,
        )
        .bind(&entity.kind)
        .bind(&entity.natural_key)
        .bind(vector_id)
        .bind(provider.model_name())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_text_title_and_body() {
        assert_eq!(build_embedding_text(Some("Title"), "body"), "Title\nbody");
        assert_eq!(build_embedding_text(None, "body"), "body");
        assert_eq!(build_embedding_text(Some("Title"), ""), "Title");
    }

    #[test]
    fn test_embedding_text_capped() {
        let body = "x".repeat(EMBED_TEXT_MAX_CHARS * 2);
        let text = build_embedding_text(Some("t"), &body);
        assert_eq!(text.chars().count(), EMBED_TEXT_MAX_CHARS);
    }

    #[test]
    fn test_wrong_dims_detected() {
        let good = vec![vec![0.0f32; 4], vec![1.0f32; 4]];
        assert_eq!(wrong_dims(&good, 4), None);

        let mixed = vec![vec![0.0f32; 4], vec![0.0f32; 3]];
        assert_eq!(wrong_dims(&mixed, 4), Some(3));
        assert!(wrong_dims(&[], 4).is_none());
    }

    #[test]
    fn test_embedding_text_cap_respects_char_boundaries() {
        // Multi-byte chars must not be split mid-codepoint.
        let body = "é".repeat(EMBED_TEXT_MAX_CHARS + 10);
        let text = build_embedding_text(None, &body);
        assert_eq!(text.chars().count(), EMBED_TEXT_MAX_CHARS);
        assert!(text.chars().all(|c| c == 'é'));
    }
}
