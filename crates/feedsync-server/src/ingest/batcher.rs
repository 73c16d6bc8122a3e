//! Partitioning of NEW records into insert batches
//!
//! The store rejects statements past a length ceiling, so records are loaded in
//! groups. The group size is derived once per run so that batches come out
//! roughly even: `ceil(M / C)` batches of `round(M / batches)` records, with
//! the last batch taking the remainder.

use tracing::debug;

use super::feed::models::FeedRecord;

/// Default maximum number of records per insert statement.
pub const DEFAULT_MAX_BATCH_RECORDS: usize = 200;

/// An ordered group of records loaded by one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Group size the run targeted; the last batch may hold fewer records
    pub target_size: usize,
    pub records: Vec<FeedRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Group size used for every batch of a run except possibly the last
pub fn group_size(record_count: usize, max_batch_records: usize) -> usize {
    let max = max_batch_records.max(1);
    if record_count == 0 {
        return 0;
    }

    let batch_count = record_count.div_ceil(max);
    if record_count >= batch_count {
        (record_count as f64 / batch_count as f64).round() as usize
    } else {
        1
    }
}

/// Split `records` into ordered batches of at most `max_batch_records`
///
/// No records are dropped or duplicated; an empty input gives no batches.
pub fn partition(records: Vec<FeedRecord>, max_batch_records: usize) -> Vec<Batch> {
    let size = group_size(records.len(), max_batch_records);
    debug!("number of products total: {}", records.len());
    debug!("Number of products per group: {}", size);

    if size == 0 {
        return Vec::new();
    }

    let mut batches = Vec::with_capacity(records.len().div_ceil(size));
    let mut remaining = records.into_iter().peekable();
    while remaining.peek().is_some() {
        let chunk: Vec<FeedRecord> = remaining.by_ref().take(size).collect();
        batches.push(Batch {
            target_size: size,
            records: chunk,
        });
    }

    debug!("Number of groups created: {}", batches.len());
    for (index, batch) in batches.iter().enumerate() {
        debug!("Group {} size: {}", index, batch.len());
    }

    batches
}
