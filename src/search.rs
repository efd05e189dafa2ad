//! Hybrid retrieval engine.
//!
//! Three caller-selected modes over the same entity set, never fused into
//! one ranked list:
//!
//! - **keyword**: FTS5 match over title+body, ranked by FTS rank. An empty
//!   query degrades to a recency-ordered listing rather than an error.
//! - **semantic**: the query is embedded with the configured provider and
//!   stored vectors (same model only) are ranked by cosine distance
//!   ascending. The engine over-fetches `overfetch_factor × limit`
//!   candidates before structured filters run, then truncates; filtered-out
//!   neighbors are not backfilled from outside the filter.
//! - **similar**: like semantic, but the query vector is an existing
//!   entity's stored vector and the entity excludes itself.
//!
//! Ordering is strictly the mode's native rank; ties fall wherever the
//! storage returns them.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::models::SearchHit;

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub kind: Option<String>,
    pub channel: Option<String>,
    pub author: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`.
    pub since: Option<String>,
}

impl SearchFilters {
    fn since_timestamp(&self) -> Result<Option<i64>> {
        match &self.since {
            None => Ok(None),
            Some(s) => {
                let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
                let ts = date
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| dt.and_utc().timestamp())
                    .unwrap_or(0);
                Ok(Some(ts))
            }
        }
    }
}

pub async fn run_search(
    config: &Config,
    query: &str,
    mode: &str,
    filters: SearchFilters,
    limit: Option<i64>,
) -> Result<()> {
    let limit = limit.unwrap_or(config.retrieval.final_limit);

    let pool = db::connect(config).await?;
    let hits = match mode {
        "keyword" => keyword_search(&pool, query, &filters, limit).await?,
        "semantic" => {
            if !config.embedding.is_enabled() {
                bail!("Mode 'semantic' requires embeddings. Set [embedding] provider in config.");
            }
            semantic_search(&pool, config, query, &filters, limit).await?
        }
        _ => bail!("Unknown search mode: {}. Use keyword or semantic.", mode),
    };

    print_hits(&hits);
    pool.close().await;
    Ok(())
}

pub async fn run_similar(config: &Config, natural_key: &str, limit: Option<i64>) -> Result<()> {
    let limit = limit.unwrap_or(config.retrieval.final_limit);
    let pool = db::connect(config).await?;
    let hits = similar(&pool, config, natural_key, limit).await?;
    print_hits(&hits);
    pool.close().await;
    Ok(())
}

/// Keyword mode. Structured filters join the MATCH in the same WHERE
/// clause, so a filtered search reaches matching rows no matter how low the
/// FTS rank places them. Empty query → recency listing with the same
/// filters, no text match.
pub async fn keyword_search(
    pool: &SqlitePool,
    query: &str,
    filters: &SearchFilters,
    limit: i64,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return recency_listing(pool, filters, limit).await;
    }

    let since_ts = filters.since_timestamp()?;

    let rows = sqlx::query(
        r#"
        SELECT e.kind, e.natural_key, e.title, e.author, e.url, e.channel, e.created_at,
               f.rank,
               snippet(entities_fts, 2, '>>>', '<<<', '...', 48) AS snippet
        FROM entities_fts f
        JOIN entities e ON e.id = f.entity_id
        WHERE entities_fts MATCH ?1
          AND (?2 IS NULL OR e.kind = ?2)
          AND (?3 IS NULL OR e.channel = ?3)
          AND (?4 IS NULL OR e.author = ?4)
          AND (?5 IS NULL OR e.created_at >= ?5)
        ORDER BY f.rank
        LIMIT ?6
        "#,
    )
    .bind(query)
    .bind(&filters.kind)
    .bind(&filters.channel)
    .bind(&filters.author)
    .bind(since_ts)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            // FTS rank is "lower is better"; negate so higher = better.
            let rank: f64 = row.get("rank");
            hit_from_row(row, -rank)
        })
        .collect())
}

async fn recency_listing(
    pool: &SqlitePool,
    filters: &SearchFilters,
    limit: i64,
) -> Result<Vec<SearchHit>> {
    let since_ts = filters.since_timestamp()?;

    let rows = sqlx::query(
        r#"
        SELECT kind, natural_key, title, author, url, channel, created_at,
               COALESCE(substr(body, 1, 240), '') AS snippet
        FROM entities
        WHERE (?1 IS NULL OR kind = ?1)
          AND (?2 IS NULL OR channel = ?2)
          AND (?3 IS NULL OR author = ?3)
          AND (?4 IS NULL OR created_at >= ?4)
        ORDER BY created_at DESC
        LIMIT ?5
        "#,
    )
    .bind(&filters.kind)
    .bind(&filters.channel)
    .bind(&filters.author)
    .bind(since_ts)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| hit_from_row(row, 0.0)).collect())
}

/// Semantic mode: embed the query, rank all same-model vectors by cosine
/// distance, filter after over-fetch.
pub async fn semantic_search(
    pool: &SqlitePool,
    config: &Config,
    query: &str,
    filters: &SearchFilters,
    limit: i64,
) -> Result<Vec<SearchHit>> {
    let query_vec = embedding::embed_query(&config.embedding, query).await?;
    ranked_by_vector(pool, config, &query_vec, filters, limit, None).await
}

/// Similar-to-item mode: the stored vector of an existing entity is the
/// query. Unknown or un-embedded natural keys yield an empty result set.
pub async fn similar(
    pool: &SqlitePool,
    config: &Config,
    natural_key: &str,
    limit: i64,
) -> Result<Vec<SearchHit>> {
    let model = match &config.embedding.model {
        Some(m) => m.clone(),
        None => bail!("Similarity search requires an embedding model in config."),
    };

    let blob: Option<Vec<u8>> = sqlx::query_scalar(
        r#"
        SELECT v.embedding
        FROM vector_map m
        JOIN vectors v ON v.id = m.vector_id
        WHERE m.natural_key = ? AND m.model = ?
        "#,
    )
    .bind(natural_key)
    .bind(&model)
    .fetch_optional(pool)
    .await?;

    let Some(blob) = blob else {
        return Ok(Vec::new());
    };
    let query_vec = embedding::blob_to_vec(&blob);

    ranked_by_vector(
        pool,
        config,
        &query_vec,
        &SearchFilters::default(),
        limit,
        Some(natural_key),
    )
    .await
}

async fn ranked_by_vector(
    pool: &SqlitePool,
    config: &Config,
    query_vec: &[f32],
    filters: &SearchFilters,
    limit: i64,
    exclude_key: Option<&str>,
) -> Result<Vec<SearchHit>> {
    let model = config
        .embedding
        .model
        .clone()
        .unwrap_or_else(|| "disabled".to_string());
    let since_ts = filters.since_timestamp()?;

    // Corpus sizes are human-scale; load same-model vectors and rank in
    // Rust.
    let rows = sqlx::query(
        r#"
        SELECT e.kind, e.natural_key, e.title, e.author, e.url, e.channel, e.created_at,
               COALESCE(substr(e.body, 1, 240), '') AS snippet,
               v.embedding
        FROM vector_map m
        JOIN vectors v ON v.id = m.vector_id
        JOIN entities e ON e.kind = m.kind AND e.natural_key = m.natural_key
        WHERE m.model = ?
        "#,
    )
    .bind(&model)
    .fetch_all(pool)
    .await?;

    let mut scored: Vec<(f64, SearchHit)> = Vec::with_capacity(rows.len());
    for row in &rows {
        let key: String = row.get("natural_key");
        if exclude_key == Some(key.as_str()) {
            continue;
        }
        let blob: Vec<u8> = row.get("embedding");
        let vec = embedding::blob_to_vec(&blob);
        let distance = embedding::cosine_distance(query_vec, &vec) as f64;
        let hit = hit_from_row(row, 1.0 - distance);
        scored.push((distance, hit));
    }

    Ok(rank_filter_truncate(
        scored,
        filters,
        since_ts,
        limit,
        config.retrieval.overfetch_factor,
    ))
}

/// Distance ascending; over-fetch BEFORE structured filters so a filter that
/// eliminates near neighbors shrinks the result rather than pulling in far
/// ones.
fn rank_filter_truncate(
    mut scored: Vec<(f64, SearchHit)>,
    filters: &SearchFilters,
    since_ts: Option<i64>,
    limit: i64,
    overfetch_factor: i64,
) -> Vec<SearchHit> {
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate((limit * overfetch_factor) as usize);

    let mut hits: Vec<SearchHit> = scored
        .into_iter()
        .map(|(_, hit)| hit)
        .filter(|hit| passes_filters(hit, filters, since_ts))
        .collect();
    hits.truncate(limit as usize);
    hits
}

fn passes_filters(hit: &SearchHit, filters: &SearchFilters, since_ts: Option<i64>) -> bool {
    if let Some(kind) = &filters.kind {
        if &hit.kind != kind {
            return false;
        }
    }
    if let Some(channel) = &filters.channel {
        if &hit.channel != channel {
            return false;
        }
    }
    if let Some(author) = &filters.author {
        if hit.author.as_deref() != Some(author.as_str()) {
            return false;
        }
    }
    if let Some(ts) = since_ts {
        if hit.created_at < ts {
            return false;
        }
    }
    true
}

fn hit_from_row(row: &sqlx::sqlite::SqliteRow, score: f64) -> SearchHit {
    SearchHit {
        kind: row.get("kind"),
        natural_key: row.get("natural_key"),
        title: row.get("title"),
        author: row.get("author"),
        url: row.get("url"),
        channel: row.get("channel"),
        created_at: row.get("created_at"),
        score,
        snippet: row.get("snippet"),
    }
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        let title = hit.title.as_deref().unwrap_or("(untitled)");
        let date = chrono::DateTime::from_timestamp(hit.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        println!("{}. [{:.2}] {} / {}", i + 1, hit.score, hit.kind, title);
        println!("    key: {}", hit.natural_key);
        println!("    channel: {}  date: {}", hit.channel, date);
        if let Some(url) = &hit.url {
            println!("    url: {}", url);
        }
        println!("    excerpt: \"{}\"", hit.snippet.replace('\n', " ").trim());
        println!();
    }
}
