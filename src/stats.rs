//! Database statistics and health overview.
//!
//! A quick summary of what's stored: entity counts per kind, embedding
//! coverage for the configured model, manifest size, and the aggregate date
//! span. Used by `lore stats` to confirm syncs and backfills are behaving.

use anyhow::Result;
use sqlx::Row;

use crate::backfill;
use crate::config::Config;
use crate::db;
use crate::manifest;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_entities: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities")
        .fetch_one(&pool)
        .await?;

    let kind_rows = sqlx::query(
        "SELECT kind, COUNT(*) AS count FROM entities GROUP BY kind ORDER BY count DESC",
    )
    .fetch_all(&pool)
    .await?;

    let merged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities WHERE channel = 'both'")
        .fetch_one(&pool)
        .await?;

    let manifest_entries = manifest::entry_count(&pool).await?;

    let aggregate_span: (Option<String>, Option<String>) =
        sqlx::query_as("SELECT MIN(date), MAX(date) FROM daily_aggregates")
            .fetch_one(&pool)
            .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Lore — Database Stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Entities:    {}", total_entities);
    for row in &kind_rows {
        let kind: String = row.get("kind");
        let count: i64 = row.get("count");
        println!("    {:<12} {}", kind, count);
    }
    println!("  Merged:      {}", merged);
    println!("  Manifest:    {} files", manifest_entries);

    if config.embedding.is_enabled() {
        let model = config.embedding.model.as_deref().unwrap_or("?");
        let pending = backfill::pending_count(&pool, model).await?;
        let embedded = total_entities - pending;
        let pct = if total_entities > 0 {
            (embedded * 100) / total_entities
        } else {
            0
        };
        println!(
            "  Embedded:    {} / {} ({}%) [{}]",
            embedded, total_entities, pct, model
        );
    }

    if let (Some(min), Some(max)) = aggregate_span {
        println!("  Aggregates:  {} .. {}", min, max);
    }

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
