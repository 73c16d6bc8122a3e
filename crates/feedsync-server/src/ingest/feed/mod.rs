//! Feed acquisition and parsing

pub mod fetch;
pub mod models;
pub mod parser;

pub use fetch::FeedFetcher;
pub use models::{Classification, FeedItem, FeedRecord};
pub use parser::{sanitize, FeedParser};
