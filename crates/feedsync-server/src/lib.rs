//! Feedsync Server Library
//!
//! Loads product feeds into a relational table and a content-indexing
//! service.
//!
//! # Overview
//!
//! A run is triggered over HTTP with a feed filename. The server downloads
//! `<FEED_BASE_URL><filename>`, parses every `item` of the feed, and
//! classifies each one against the identifiers already stored. NEW records
//! are pushed to the indexing endpoint and inserted into the target table in
//! bounded batches; KNOWN records are only counted.
//!
//! - **ingest**: the feed pipeline, its stages, and the background job registry
//! - **features**: HTTP routes that trigger and inspect runs
//! - **api**: router assembly, service banner and health check
//! - **config**: environment-based configuration
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use feedsync_server::{config::Config, ingest::{FeedPipeline, PgTableStore}};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = sqlx::PgPool::connect(&config.database.url).await?;
//!     let store = Arc::new(PgTableStore::new(
//!         pool,
//!         config.ingest.store.table.clone(),
//!         config.ingest.store.key_column.clone(),
//!     ));
//!     let summary = FeedPipeline::new(config.ingest, store)?.run("products.xml").await?;
//!     println!("{} new records", summary.new_records);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

pub use error::AppError;
