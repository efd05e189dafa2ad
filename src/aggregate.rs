//! Derived daily aggregates (contribution-graph rollups).
//!
//! Fully derived from raw activity rows: recomputation is always a full
//! replace of the date's row, never an increment, so the table can be
//! deleted and regenerated at any time without drift.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Activity-level bucket boundaries: total activity of 1–4 is level 1,
/// 5–9 level 2, 10–19 level 3, 20+ level 4. The single source of truth for
/// these numbers.
pub const LEVEL_THRESHOLDS: [i64; 4] = [1, 5, 10, 20];

pub fn activity_level(total: i64) -> i64 {
    LEVEL_THRESHOLDS
        .iter()
        .rev()
        .position(|&t| total >= t)
        .map(|pos| (LEVEL_THRESHOLDS.len() - pos) as i64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyAggregate {
    pub sessions: i64,
    pub commits: i64,
    pub issues_closed: i64,
    pub prs_merged: i64,
    pub effort_minutes: i64,
    pub level: i64,
}

/// Recompute one date's aggregate from scratch and replace its row.
pub async fn recalculate(config: &Config, pool: &SqlitePool, date: &str) -> Result<DailyAggregate> {
    let (day_start, day_end) = day_bounds(date)?;

    let sessions = count_rows(pool, day_start, day_end, "kind = 'session'").await?;
    let commits = count_rows(pool, day_start, day_end, "subkind = 'commit'").await?;
    let issues_closed = count_rows(pool, day_start, day_end, "subkind = 'issue_closed'").await?;
    let prs_merged = count_rows(pool, day_start, day_end, "subkind = 'pr_merged'").await?;

    let weights = &config.aggregates;
    let effort_minutes = sessions * weights.minutes_per_session
        + commits * weights.minutes_per_commit
        + issues_closed * weights.minutes_per_issue
        + prs_merged * weights.minutes_per_pr;

    let total = sessions + commits + issues_closed + prs_merged;
    let aggregate = DailyAggregate {
        sessions,
        commits,
        issues_closed,
        prs_merged,
        effort_minutes,
        level: activity_level(total),
    };

    sqlx::query(
        r#"
        INSERT INTO daily_aggregates (date, sessions, commits, issues_closed, prs_merged, effort_minutes, level)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(date) DO UPDATE SET
            sessions = excluded.sessions,
            commits = excluded.commits,
            issues_closed = excluded.issues_closed,
            prs_merged = excluded.prs_merged,
            effort_minutes = excluded.effort_minutes,
            level = excluded.level
        "#,
    )
    .bind(date)
    .bind(aggregate.sessions)
    .bind(aggregate.commits)
    .bind(aggregate.issues_closed)
    .bind(aggregate.prs_merged)
    .bind(aggregate.effort_minutes)
    .bind(aggregate.level)
    .execute(pool)
    .await?;

    Ok(aggregate)
}

/// `lore recalc <from> [<to>]`: recompute a date or inclusive date range on
/// demand.
pub async fn run_recalc(config: &Config, from: &str, to: Option<String>) -> Result<()> {
    let pool = db::connect(config).await?;

    let start = NaiveDate::parse_from_str(from, "%Y-%m-%d")?;
    let end = match to {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")?,
        None => start,
    };
    if end < start {
        bail!("Invalid range: {} is before {}", end, start);
    }

    let mut date = start;
    let mut days = 0u64;
    while date <= end {
        let formatted = date.format("%Y-%m-%d").to_string();
        let agg = recalculate(config, &pool, &formatted).await?;
        println!(
            "  {}: {} sessions, {} commits, {} issues closed, {} PRs merged, ~{} min, level {}",
            formatted,
            agg.sessions,
            agg.commits,
            agg.issues_closed,
            agg.prs_merged,
            agg.effort_minutes,
            agg.level
        );
        days += 1;
        date = date
            .succ_opt()
            .ok_or_else(|| anyhow::anyhow!("date overflow"))?;
    }

    println!("recalculated {} day(s)", days);
    pool.close().await;
    Ok(())
}

async fn count_rows(
    pool: &SqlitePool,
    day_start: i64,
    day_end: i64,
    predicate: &str,
) -> Result<i64> {
    // `predicate` is one of a fixed set of literals above, never user input.
    let sql = format!(
        "SELECT COUNT(*) FROM entities WHERE {} AND created_at >= ? AND created_at < ?",
        predicate
    );
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn day_bounds(date: &str) -> Result<(i64, i64)> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
    let start = day
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0);
    Ok((start, start + 86_400))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_levels() {
        assert_eq!(activity_level(0), 0);
        assert_eq!(activity_level(1), 1);
        assert_eq!(activity_level(4), 1);
        assert_eq!(activity_level(5), 2);
        assert_eq!(activity_level(9), 2);
        assert_eq!(activity_level(10), 3);
        assert_eq!(activity_level(19), 3);
        assert_eq!(activity_level(20), 4);
        assert_eq!(activity_level(1000), 4);
    }

    #[test]
    fn test_day_bounds() {
        let (start, end) = day_bounds("2024-06-01").unwrap();
        assert_eq!(start, 1717200000);
        assert_eq!(end - start, 86_400);
        assert!(day_bounds("not-a-date").is_err());
    }
}
