//! # Lore CLI (`lore`)
//!
//! The `lore` binary is the interface to the knowledge store. It provides
//! commands for database initialization, export ingestion, retrieval,
//! embedding backfill, aggregate recomputation, and the blog-draft workflow.
//!
//! ## Usage
//!
//! ```bash
//! lore --config ./config/lore.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lore init` | Create the SQLite database and run schema migrations |
//! | `lore sync <source>` | Ingest exports (twitter, youtube, github, sessions, transcripts, all) |
//! | `lore search "<query>"` | Search stored entities |
//! | `lore similar <key>` | Entities nearest to an existing one |
//! | `lore get <key>` | Print one entity by natural key |
//! | `lore embed pending` | Backfill missing embeddings |
//! | `lore recalc <date>` | Recompute daily aggregates |
//! | `lore blog <action>` | Manage blog drafts |
//! | `lore stats` | Database overview |

mod aggregate;
mod backfill;
mod blog;
mod config;
mod db;
mod embedding;
mod get;
mod ingest;
mod manifest;
mod migrate;
mod models;
mod normalize;
mod scan;
mod search;
mod stats;
mod vtt;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// A local-first personal knowledge store for digital activity exports.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lore.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lore",
    about = "Lore — a local-first personal knowledge store for digital activity exports",
    version,
    long_about = "Lore ingests exports of your digital activity (tweets, YouTube saves, GitHub \
    events and stars, coding-agent sessions, subtitle transcripts) into SQLite, deduplicates \
    across channels, backfills embeddings, and answers keyword and semantic queries."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. Idempotent;
    /// running it multiple times is safe.
    Init,

    /// Ingest exports from a source.
    ///
    /// Scans the source's export directory, skips files already in the
    /// manifest, normalizes and deduplicates records, and writes one
    /// manifest entry per processed file.
    Sync {
        /// Source: `all`, `twitter`, `youtube`, `github`, `sessions`, or
        /// `transcripts`.
        source: String,
    },

    /// Search stored entities.
    Search {
        /// The query string. Empty string lists recent entities.
        query: String,

        /// Search mode: `keyword` (FTS5) or `semantic` (vector).
        #[arg(long, default_value = "keyword")]
        mode: String,

        /// Filter by entity kind (tweet, video, repo, event, session, transcript).
        #[arg(long)]
        kind: Option<String>,

        /// Filter by provenance channel (bookmark, like, both, ...).
        #[arg(long)]
        channel: Option<String>,

        /// Filter by author.
        #[arg(long)]
        author: Option<String>,

        /// Only entities created on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Entities most similar to an existing one (vector mode, self-excluded).
    Similar {
        /// Natural key of the reference entity (URL, video id, ...).
        key: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Print one entity by natural key.
    Get {
        /// Natural key (URL, video id, gh-event id, ...).
        key: String,
    },

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Recompute daily activity aggregates for a date or range.
    Recalc {
        /// Start date (YYYY-MM-DD).
        from: String,

        /// End date, inclusive (YYYY-MM-DD). Defaults to the start date.
        #[arg(long)]
        to: Option<String>,
    },

    /// Manage blog drafts.
    Blog {
        #[command(subcommand)]
        action: BlogAction,
    },

    /// Show database statistics.
    Stats,
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed entities that have no vector for the configured model.
    ///
    /// Capped per invocation; run repeatedly (e.g. from cron) until the
    /// pending count reaches zero.
    Pending {
        /// Maximum number of entities to embed in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Override the batch size from config (texts per API call).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum BlogAction {
    /// Create a new draft in `pending_review`.
    Create {
        title: String,
    },
    /// List drafts with their statuses.
    List,
    /// Move a draft forward: pending_review → reviewed → published.
    SetStatus {
        id: String,
        /// Target status (`reviewed` or `published`).
        status: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync { source } => {
            ingest::run_sync(&cfg, &source).await?;
        }
        Commands::Search {
            query,
            mode,
            kind,
            channel,
            author,
            since,
            limit,
        } => {
            let filters = search::SearchFilters {
                kind,
                channel,
                author,
                since,
            };
            search::run_search(&cfg, &query, &mode, filters, limit).await?;
        }
        Commands::Similar { key, limit } => {
            search::run_similar(&cfg, &key, limit).await?;
        }
        Commands::Get { key } => {
            get::run_get(&cfg, &key).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending {
                limit,
                batch_size,
                dry_run,
            } => {
                backfill::run_backfill(&cfg, limit, batch_size, dry_run).await?;
            }
        },
        Commands::Recalc { from, to } => {
            aggregate::run_recalc(&cfg, &from, to).await?;
        }
        Commands::Blog { action } => match action {
            BlogAction::Create { title } => {
                blog::run_create(&cfg, &title).await?;
            }
            BlogAction::List => {
                blog::run_list(&cfg).await?;
            }
            BlogAction::SetStatus { id, status } => {
                blog::run_set_status(&cfg, &id, &status).await?;
            }
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
