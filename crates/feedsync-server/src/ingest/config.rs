//! Ingestion configuration
//!
//! Everything a feed run needs: where the feed lives, which table it loads
//! into, how statements are bounded, and where new records are indexed.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::batcher::DEFAULT_MAX_BATCH_RECORDS;
use super::feed::parser::GOOGLE_BASE_NAMESPACE;
use super::statement::{MissingValuePolicy, DEFAULT_MAX_STATEMENT_BYTES};

/// Default timeout for fetching a feed document.
pub const DEFAULT_FEED_TIMEOUT_SECS: u64 = 10;

/// Default timeout for one indexing request.
pub const DEFAULT_INDEXER_TIMEOUT_SECS: u64 = 10;

/// Schema-version tag stamped on every record.
pub const DEFAULT_RECORD_VERSION: &str = "4";

/// Finished jobs kept for introspection.
pub const DEFAULT_JOB_HISTORY_LIMIT: usize = 100;

pub const DEFAULT_STORE_TABLE: &str = "public.products";
pub const DEFAULT_STORE_KEY_COLUMN: &str = "sku";
pub const DEFAULT_INDEXER_FIELD_PREFIX: &str = "ca";

/// Passthrough fields flattened into indexing keys by default.
pub const DEFAULT_INDEXER_FIELDS: &[&str] = &[
    "brand",
    "google_product_category",
    "product_type",
    "gender",
    "color",
    "category",
    "sub_category",
    "basic_type",
];

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub feed: FeedConfig,
    pub store: StoreConfig,
    pub indexer: IndexerConfig,
    /// Maximum records per insert statement
    pub max_batch_records: usize,
    /// Maximum encoded statement length in bytes
    pub max_statement_bytes: usize,
    pub missing_value: MissingValuePolicy,
    pub record_version: String,
    /// Abort the run instead of treating every record as new when the store
    /// returns no identifiers
    pub abort_on_empty_existing: bool,
    pub job_history_limit: usize,
}

/// Feed source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Prefix the requested filename is appended to
    pub base_url: String,
    pub timeout_secs: u64,
    /// Namespace stripped from field tags
    pub namespace: String,
}

/// Target table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Table name, optionally schema-qualified (`schema.table`)
    pub table: String,
    /// Column holding the record identifier
    pub key_column: String,
}

/// Content-indexing endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub enabled: bool,
    pub url: String,
    /// Sent verbatim as the `Authorization` header
    #[serde(skip_serializing)]
    pub auth_key: String,
    pub timeout_secs: u64,
    pub field_prefix: String,
    pub fields: Vec<String>,
    /// Indexing requests in flight at once
    pub concurrency: usize,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl IngestConfig {
    /// Load and validate ingestion configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self::load_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read environment variables without validating, so callers can
    /// override settings first
    pub fn load_env() -> anyhow::Result<Self> {
        let missing_value = match std::env::var("INGEST_MISSING_VALUE") {
            Ok(raw) => raw.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            Err(_) => MissingValuePolicy::default(),
        };

        let config = Self {
            feed: FeedConfig::from_env(),
            store: StoreConfig {
                table: env_string("STORE_TABLE", DEFAULT_STORE_TABLE),
                key_column: env_string("STORE_KEY_COLUMN", DEFAULT_STORE_KEY_COLUMN),
            },
            indexer: IndexerConfig::from_env(),
            max_batch_records: env_or("INGEST_MAX_BATCH_RECORDS", DEFAULT_MAX_BATCH_RECORDS),
            max_statement_bytes: env_or("INGEST_MAX_STATEMENT_BYTES", DEFAULT_MAX_STATEMENT_BYTES),
            missing_value,
            record_version: env_string("INGEST_RECORD_VERSION", DEFAULT_RECORD_VERSION),
            abort_on_empty_existing: env_or("INGEST_ABORT_ON_EMPTY_EXISTING", false),
            job_history_limit: env_or("INGEST_JOB_HISTORY_LIMIT", DEFAULT_JOB_HISTORY_LIMIT),
        };

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.feed.base_url.is_empty() {
            anyhow::bail!("FEED_BASE_URL cannot be empty");
        }
        if self.feed.timeout_secs == 0 {
            anyhow::bail!("FEED_TIMEOUT_SECS must be greater than 0");
        }
        if self.store.table.is_empty() {
            anyhow::bail!("STORE_TABLE cannot be empty");
        }
        if self.store.key_column.is_empty() {
            anyhow::bail!("STORE_KEY_COLUMN cannot be empty");
        }
        if self.max_batch_records == 0 {
            anyhow::bail!("INGEST_MAX_BATCH_RECORDS must be greater than 0");
        }
        if self.max_statement_bytes == 0 {
            anyhow::bail!("INGEST_MAX_STATEMENT_BYTES must be greater than 0");
        }
        self.indexer.validate()?;
        Ok(())
    }
}

impl FeedConfig {
    fn from_env() -> Self {
        Self {
            base_url: env_string("FEED_BASE_URL", ""),
            timeout_secs: env_or("FEED_TIMEOUT_SECS", DEFAULT_FEED_TIMEOUT_SECS),
            namespace: env_string("FEED_NAMESPACE", GOOGLE_BASE_NAMESPACE),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl IndexerConfig {
    fn from_env() -> Self {
        let fields = std::env::var("INDEXER_FIELDS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| DEFAULT_INDEXER_FIELDS.iter().map(|s| s.to_string()).collect());

        Self {
            enabled: env_or("INDEXER_ENABLED", true),
            url: env_string("INDEXER_URL", ""),
            auth_key: std::env::var("INDEXER_AUTH_KEY")
                .or_else(|_| std::env::var("KEY"))
                .unwrap_or_default(),
            timeout_secs: env_or("INDEXER_TIMEOUT_SECS", DEFAULT_INDEXER_TIMEOUT_SECS),
            field_prefix: env_string("INDEXER_FIELD_PREFIX", DEFAULT_INDEXER_FIELD_PREFIX),
            fields,
            concurrency: env_or("INDEXER_CONCURRENCY", 1),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.url.is_empty() {
            anyhow::bail!("INDEXER_URL cannot be empty when indexing is enabled");
        }
        if self.auth_key.is_empty() {
            anyhow::bail!("INDEXER_AUTH_KEY (or KEY) must be set when indexing is enabled");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("INDEXER_TIMEOUT_SECS must be greater than 0");
        }
        if self.concurrency == 0 {
            anyhow::bail!("INDEXER_CONCURRENCY must be greater than 0");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            store: StoreConfig::default(),
            indexer: IndexerConfig::default(),
            max_batch_records: DEFAULT_MAX_BATCH_RECORDS,
            max_statement_bytes: DEFAULT_MAX_STATEMENT_BYTES,
            missing_value: MissingValuePolicy::default(),
            record_version: DEFAULT_RECORD_VERSION.to_string(),
            abort_on_empty_existing: false,
            job_history_limit: DEFAULT_JOB_HISTORY_LIMIT,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000/feeds/".to_string(),
            timeout_secs: DEFAULT_FEED_TIMEOUT_SECS,
            namespace: GOOGLE_BASE_NAMESPACE.to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_STORE_TABLE.to_string(),
            key_column: DEFAULT_STORE_KEY_COLUMN.to_string(),
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            auth_key: String::new(),
            timeout_secs: DEFAULT_INDEXER_TIMEOUT_SECS,
            field_prefix: DEFAULT_INDEXER_FIELD_PREFIX.to_string(),
            fields: DEFAULT_INDEXER_FIELDS.iter().map(|s| s.to_string()).collect(),
            concurrency: 1,
        }
    }
}
