//! Error types for a feed run

use super::statement::StatementError;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that end a feed run early
///
/// Per-item and per-push problems never surface here; they are logged and
/// counted on the [`RunSummary`](super::pipeline::RunSummary) instead.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Feed request failed: {0}")]
    FeedRequest(#[source] reqwest::Error),

    #[error("Feed request timed out after {0} seconds")]
    FeedTimeout(u64),

    #[error("Feed {filename} could not be accessed: HTTP {status}")]
    FeedStatus { filename: String, status: u16 },

    #[error("Feed XML is unusable: {0}")]
    Xml(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Existing identifier set is empty and runs are configured to abort")]
    EmptyExistingKeys,

    #[error("Statement error: {0}")]
    Statement(#[from] StatementError),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Invalid feed filename: {0}")]
    InvalidFilename(String),
}

impl From<quick_xml::Error> for IngestError {
    fn from(err: quick_xml::Error) -> Self {
        IngestError::Xml(err.to_string())
    }
}
