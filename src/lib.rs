//! # Lore
//!
//! A local-first personal knowledge store for digital activity exports.
//!
//! Lore ingests exports of a person's digital activity (tweet bookmarks and
//! likes, YouTube saves, GitHub events and stars, coding-agent sessions,
//! video subtitle transcripts) into SQLite, deduplicates the same item
//! arriving from multiple channels, backfills embedding vectors in
//! rate-limited batches, and answers keyword and semantic queries over the
//! whole corpus.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌───────────┐
//! │ Export files │──▶│  Normalize +  │──▶│  SQLite    │
//! │ JSON / VTT   │   │ Dedup Upsert  │   │ FTS5+Vecs │
//! └──────────────┘   └───────┬───────┘   └─────┬─────┘
//!                            │                 │
//!                     manifest (per-file   ┌───┴──────────┐
//!                     content hashes)      ▼              ▼
//!                                    ┌──────────┐  ┌───────────┐
//!                                    │ backfill │  │  search / │
//!                                    │ (embed)  │  │ aggregate │
//!                                    └──────────┘  └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lore init                        # create database
//! lore sync all                    # ingest configured exports
//! lore embed pending               # backfill embeddings
//! lore search "borrow checker"     # keyword search
//! lore search "async io" --mode semantic
//! lore similar https://x.com/a/status/1
//! lore stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`scan`] | Export-directory discovery + shape probing |
//! | [`normalize`] | Per-source adapters |
//! | [`vtt`] | Subtitle parsing and transcript windowing |
//! | [`ingest`] | Manifest-checked deduplicating upsert pipeline |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`backfill`] | Embedding backfill scheduler |
//! | [`search`] | Keyword, semantic, and similar-to-item retrieval |
//! | [`aggregate`] | Daily activity rollups |
//! | [`blog`] | Draft review workflow |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod aggregate;
pub mod backfill;
pub mod blog;
pub mod config;
pub mod db;
pub mod embedding;
pub mod get;
pub mod ingest;
pub mod manifest;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod scan;
pub mod search;
pub mod stats;
pub mod vtt;
