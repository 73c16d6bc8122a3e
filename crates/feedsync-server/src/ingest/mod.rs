//! Feed ingestion
//!
//! Fetches a product feed, classifies every item against the identifiers
//! already stored, and loads the new ones into the table store and the
//! content-indexing endpoint.

pub mod batcher;
pub mod config;
pub mod context;
pub mod error;
pub mod feed;
pub mod jobs;
pub mod pipeline;
pub mod reconcile;
pub mod sink;
pub mod statement;

pub use config::IngestConfig;
pub use context::RunContext;
pub use error::{IngestError, Result};
pub use jobs::{JobInfo, JobRegistry, JobState};
pub use pipeline::{FeedPipeline, RunSummary};
pub use sink::{DryRunStore, PgTableStore, TableStore};
