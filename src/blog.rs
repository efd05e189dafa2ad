//! Blog-draft review workflow.
//!
//! A small strictly-forward state machine riding on the same upsert
//! pattern: `pending_review → reviewed → published`. Entering `published`
//! stamps the publish timestamp.

use anyhow::{bail, Result};
use sqlx::Row;
use uuid::Uuid;

use crate::config::Config;
use crate::db;

const STATUSES: [&str; 3] = ["pending_review", "reviewed", "published"];

fn status_rank(status: &str) -> Option<usize> {
    STATUSES.iter().position(|&s| s == status)
}

pub async fn run_create(config: &Config, title: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query("INSERT INTO blog_drafts (id, title, created_at) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(title)
        .bind(now)
        .execute(&pool)
        .await?;

    println!("created draft {} ({})", id, title);
    pool.close().await;
    Ok(())
}

pub async fn run_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let rows = sqlx::query(
        "SELECT id, title, status, published_at FROM blog_drafts ORDER BY created_at DESC",
    )
    .fetch_all(&pool)
    .await?;

    if rows.is_empty() {
        println!("No drafts.");
    }
    for row in &rows {
        let id: String = row.get("id");
        let title: String = row.get("title");
        let status: String = row.get("status");
        let published_at: Option<i64> = row.get("published_at");
        match published_at.and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)) {
            Some(dt) => println!(
                "  {} [{}] {} (published {})",
                id,
                status,
                title,
                dt.format("%Y-%m-%d")
            ),
            None => println!("  {} [{}] {}", id, status, title),
        }
    }

    pool.close().await;
    Ok(())
}

pub async fn run_set_status(config: &Config, id: &str, status: &str) -> Result<()> {
    let Some(new_rank) = status_rank(status) else {
        bail!(
            "Unknown status: {}. Use pending_review, reviewed, or published.",
            status
        );
    };

    let pool = db::connect(config).await?;

    let current: Option<String> = sqlx::query_scalar("SELECT status FROM blog_drafts WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    let Some(current) = current else {
        pool.close().await;
        bail!("draft not found: {}", id);
    };

    // Transitions are strictly forward; there is no path back.
    let current_rank = status_rank(&current).unwrap_or(0);
    if new_rank <= current_rank {
        pool.close().await;
        bail!("cannot move draft from '{}' to '{}'", current, status);
    }

    let published_at = if status == "published" {
        Some(chrono::Utc::now().timestamp())
    } else {
        None
    };

    sqlx::query("UPDATE blog_drafts SET status = ?, published_at = COALESCE(?, published_at) WHERE id = ?")
        .bind(status)
        .bind(published_at)
        .bind(id)
        .execute(&pool)
        .await?;

    println!("draft {} → {}", id, status);
    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_order() {
        assert_eq!(status_rank("pending_review"), Some(0));
        assert_eq!(status_rank("reviewed"), Some(1));
        assert_eq!(status_rank("published"), Some(2));
        assert_eq!(status_rank("draft"), None);
    }
}
