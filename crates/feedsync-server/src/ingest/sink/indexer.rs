//! Content-indexing push
//!
//! Every NEW record is flattened into a JSON object whose allow-listed fields
//! become `"<prefix>.<field> - <value>": 1` keys, then POSTed to the indexing
//! endpoint. Delivery problems are logged and counted; they never fail a run.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::ingest::config::IndexerConfig;
use crate::ingest::error::{IngestError, Result};
use crate::ingest::feed::models::{FeedRecord, SKU_FIELD, URL_FIELD, VERSION_FIELD};

/// Totals of one indexing push
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub pushed: usize,
    pub failed: usize,
}

/// Why a single push was counted as failed
#[derive(Debug, Clone, PartialEq)]
pub enum PushFailure {
    Transport(String),
    Timeout,
    UnreadableResponse(String),
    Rejected(f64),
}

impl std::fmt::Display for PushFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushFailure::Transport(e) => write!(f, "transport error: {}", e),
            PushFailure::Timeout => write!(f, "request timed out"),
            PushFailure::UnreadableResponse(e) => write!(f, "unreadable response: {}", e),
            PushFailure::Rejected(status) => write!(f, "rejected with status {}", status),
        }
    }
}

/// Any JSON number is accepted as the status, integer or not
#[derive(Debug, Deserialize)]
struct IndexResponse {
    status: f64,
}

/// Build the indexing document for one record
///
/// `version` and `sku` are always present; `url` only when the record has one.
pub fn index_payload(record: &FeedRecord, prefix: &str, allow_list: &HashSet<String>) -> Value {
    let mut payload = Map::new();

    for (field, value) in record.passthrough() {
        if allow_list.contains(field) {
            payload.insert(format!("{}.{} - {}", prefix, field, value), Value::from(1));
        }
    }

    payload.insert(VERSION_FIELD.to_string(), Value::from(record.version()));
    if let Some(url) = record.url() {
        payload.insert(URL_FIELD.to_string(), Value::from(url));
    }
    payload.insert(SKU_FIELD.to_string(), Value::from(record.sku()));

    Value::Object(payload)
}

/// Client for the content-indexing endpoint
#[derive(Debug, Clone)]
pub struct IndexingClient {
    client: Client,
    url: String,
    auth_key: String,
    prefix: String,
    allow_list: HashSet<String>,
    concurrency: usize,
}

impl IndexingClient {
    pub fn new(config: &IndexerConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| IngestError::Client(e.to_string()))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| IngestError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            auth_key: config.auth_key.clone(),
            prefix: config.field_prefix.clone(),
            allow_list: config.fields.iter().cloned().collect(),
            concurrency: config.concurrency.max(1),
        })
    }

    /// Push one record
    pub async fn push(&self, record: &FeedRecord) -> std::result::Result<(), PushFailure> {
        let payload = index_payload(record, &self.prefix, &self.allow_list);
        debug!("{}", payload);

        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, &self.auth_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PushFailure::Timeout
                } else {
                    PushFailure::Transport(e.to_string())
                }
            })?;

        let body: IndexResponse = response
            .json()
            .await
            .map_err(|e| PushFailure::UnreadableResponse(e.to_string()))?;

        debug!(sku = record.sku(), status = body.status, "Indexing response");
        if body.status > 299.0 {
            return Err(PushFailure::Rejected(body.status));
        }
        Ok(())
    }

    async fn push_counted(&self, record: FeedRecord) -> (String, std::result::Result<(), PushFailure>) {
        let outcome = self.push(&record).await;
        (record.sku().to_string(), outcome)
    }

    /// Push every record, at most `concurrency` requests in flight
    pub async fn push_all(&self, records: &[FeedRecord]) -> IndexStats {
        info!(
            "Pushing {} records to the indexing endpoint (concurrency={})",
            records.len(),
            self.concurrency
        );

        // Owned records keep the stream free of borrowed closure arguments,
        // so the run future stays spawnable.
        let mut pushes = stream::iter(records.iter().cloned())
            .map(|record| self.push_counted(record))
            .buffer_unordered(self.concurrency);

        let mut stats = IndexStats::default();
        while let Some((sku, outcome)) = pushes.next().await {
            match outcome {
                Ok(()) => stats.pushed += 1,
                Err(failure) => {
                    error!(sku = %sku, "Indexing push failed: {}", failure);
                    stats.failed += 1;
                },
            }
        }

        info!("Indexing complete: {} pushed, {} failed", stats.pushed, stats.failed);
        stats
    }
}
