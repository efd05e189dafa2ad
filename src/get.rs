//! Entity retrieval by natural key.

use anyhow::{bail, Result};
use sqlx::Row;

use crate::config::Config;
use crate::db;

pub async fn run_get(config: &Config, natural_key: &str) -> Result<()> {
    let pool = db::connect(config).await?;

    // Natural keys are source-disjoint in practice, so no kind is required.
    let row = sqlx::query(
        r#"
        SELECT kind, natural_key, title, author, url, body, subkind, channel,
               created_at, tags_json, refs_json
        FROM entities WHERE natural_key = ?
        "#,
    )
    .bind(natural_key)
    .fetch_optional(&pool)
    .await?;

    let Some(row) = row else {
        pool.close().await;
        bail!("entity not found: {}", natural_key);
    };

    let kind: String = row.get("kind");
    let title: Option<String> = row.get("title");
    let author: Option<String> = row.get("author");
    let url: Option<String> = row.get("url");
    let body: String = row.get("body");
    let channel: String = row.get("channel");
    let created_at: i64 = row.get("created_at");
    let tags_json: String = row.get("tags_json");
    let refs_json: String = row.get("refs_json");

    let date = chrono::DateTime::from_timestamp(created_at, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();

    println!("{} {}", kind, natural_key);
    if let Some(title) = title {
        println!("  title: {}", title);
    }
    if let Some(author) = author {
        println!("  author: {}", author);
    }
    println!("  channel: {}", channel);
    println!("  created: {}", date);
    if let Some(url) = url {
        println!("  url: {}", url);
    }
    if tags_json != "[]" {
        println!("  tags: {}", tags_json);
    }
    if refs_json != "[]" {
        println!("  repos: {}", refs_json);
    }
    if !body.is_empty() {
        println!();
        println!("{}", body);
    }

    pool.close().await;
    Ok(())
}
