use anyhow::Result;

use crate::config::Config;
use crate::db;

/// Create the full schema. Idempotent, safe to run on every `lore init`.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            natural_key TEXT NOT NULL,
            title TEXT,
            author TEXT,
            url TEXT,
            body TEXT NOT NULL DEFAULT '',
            subkind TEXT,
            channel TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            ingested_at INTEGER NOT NULL,
            tags_json TEXT NOT NULL DEFAULT '[]',
            refs_json TEXT NOT NULL DEFAULT '[]',
            metadata_json TEXT NOT NULL DEFAULT '{}',
            raw_json TEXT,
            UNIQUE(kind, natural_key)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Processed source files, keyed by content hash. A hash present here is
    // never reprocessed.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS manifest (
            content_hash TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            kind TEXT NOT NULL,
            channel TEXT NOT NULL,
            processed_at INTEGER NOT NULL,
            seen INTEGER NOT NULL,
            inserted INTEGER NOT NULL,
            upgraded INTEGER NOT NULL,
            skipped INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Append-only vector rows. Entities point at these through vector_map;
    // there is deliberately no foreign key back to entities.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vector_map (
            kind TEXT NOT NULL,
            natural_key TEXT NOT NULL,
            vector_id INTEGER NOT NULL,
            model TEXT NOT NULL,
            PRIMARY KEY (kind, natural_key)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_aggregates (
            date TEXT PRIMARY KEY,
            sessions INTEGER NOT NULL,
            commits INTEGER NOT NULL,
            issues_closed INTEGER NOT NULL,
            prs_merged INTEGER NOT NULL,
            effort_minutes INTEGER NOT NULL,
            level INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blog_drafts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            body TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'pending_review',
            created_at INTEGER NOT NULL,
            published_at INTEGER
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // FTS5 virtual table over entity text. FTS5 CREATE is not idempotent
    // natively, so check sqlite_master first.
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='entities_fts'",
    )
    .fetch_one(&pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE entities_fts USING fts5(
                entity_id UNINDEXED,
                kind UNINDEXED,
                text
            )
            "#,
        )
        .execute(&pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entities_created_at ON entities(created_at DESC)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vector_map_model ON vector_map(model)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
