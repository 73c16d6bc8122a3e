//! Per-run context threaded through every pipeline stage

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Format of the `date_added` column, microsecond precision.
pub const DATE_ADDED_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Identity and timestamp of one feed run
///
/// Every record produced by a run carries the same `date_added`, taken once
/// when the context is created.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub filename: String,
    pub started_at: DateTime<Utc>,
    pub date_added: String,
}

impl RunContext {
    pub fn new(filename: impl Into<String>) -> Self {
        Self::at(filename, Utc::now())
    }

    /// Build a context for a fixed start instant
    pub fn at(filename: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            filename: filename.into(),
            started_at,
            date_added: started_at.format(DATE_ADDED_FORMAT).to_string(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
