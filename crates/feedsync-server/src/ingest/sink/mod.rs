//! Destinations for NEW records: the table store and the indexing endpoint

pub mod indexer;
pub mod store;

pub use indexer::{index_payload, IndexStats, IndexingClient, PushFailure};
pub use store::{DryRunStore, PgTableStore, TableStore};
