//! Table store access
//!
//! [`TableStore`] is the seam between the pipeline and the database: it
//! supplies the existing identifier set and the column order, and executes
//! finished insert statements one at a time.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::ingest::error::Result;
use crate::ingest::reconcile::ExistingKeys;
use crate::ingest::statement::{quote_identifier, Schema};

/// Default schema for unqualified table names.
const DEFAULT_SCHEMA: &str = "public";

/// Storage backend for a feed run
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Fully qualified name of the target table
    fn table(&self) -> &str;

    /// Every identifier currently stored, read once per run
    async fn existing_keys(&self) -> Result<ExistingKeys>;

    /// Column names of the target table in ordinal order
    async fn schema(&self) -> Result<Schema>;

    /// Run one insert statement, returning the affected row count
    async fn execute(&self, statement: &str) -> Result<u64>;
}

/// Split `schema.table` into its parts, defaulting the schema
pub fn split_table_name(table: &str) -> (&str, &str) {
    match table.split_once('.') {
        Some((schema, name)) => (schema, name),
        None => (DEFAULT_SCHEMA, table),
    }
}

/// PostgreSQL-backed table store
#[derive(Debug, Clone)]
pub struct PgTableStore {
    pool: PgPool,
    table: String,
    key_column: String,
}

impl PgTableStore {
    pub fn new(pool: PgPool, table: impl Into<String>, key_column: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
            key_column: key_column.into(),
        }
    }
}

#[async_trait]
impl TableStore for PgTableStore {
    fn table(&self) -> &str {
        &self.table
    }

    async fn existing_keys(&self) -> Result<ExistingKeys> {
        let sql = format!(
            "SELECT {}::text FROM {}",
            quote_identifier(&self.key_column),
            quote_identifier(&self.table)
        );
        let rows: Vec<Option<String>> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;

        let keys = ExistingKeys::new(rows.into_iter().flatten());
        info!("Loaded {} existing identifiers from {}", keys.len(), self.table);
        Ok(keys)
    }

    async fn schema(&self) -> Result<Schema> {
        let (schema, name) = split_table_name(&self.table);
        let columns: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(schema)
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        debug!("Schema of {}: {:?}", self.table, columns);
        Ok(Schema::new(columns))
    }

    async fn execute(&self, statement: &str) -> Result<u64> {
        let result = sqlx::raw_sql(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

/// Store that reads from an inner store but only logs statements
pub struct DryRunStore {
    inner: Arc<dyn TableStore>,
}

impl DryRunStore {
    pub fn new(inner: Arc<dyn TableStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TableStore for DryRunStore {
    fn table(&self) -> &str {
        self.inner.table()
    }

    async fn existing_keys(&self) -> Result<ExistingKeys> {
        self.inner.existing_keys().await
    }

    async fn schema(&self) -> Result<Schema> {
        self.inner.schema().await
    }

    async fn execute(&self, statement: &str) -> Result<u64> {
        info!("[dry-run] skipping statement of {} bytes", statement.len());
        debug!("[dry-run] {}", statement);
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        executed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TableStore for RecordingStore {
        fn table(&self) -> &str {
            "products"
        }

        async fn existing_keys(&self) -> Result<ExistingKeys> {
            Ok(ExistingKeys::new(["X"]))
        }

        async fn schema(&self) -> Result<Schema> {
            Ok(Schema::new(["sku"]))
        }

        async fn execute(&self, statement: &str) -> Result<u64> {
            self.executed.lock().unwrap().push(statement.to_string());
            Ok(1)
        }
    }

    #[test]
    fn test_split_table_name() {
        assert_eq!(split_table_name("catalog.products"), ("catalog", "products"));
        assert_eq!(split_table_name("products"), ("public", "products"));
    }

    #[tokio::test]
    async fn test_dry_run_reads_through_but_never_executes() {
        let inner = Arc::new(RecordingStore::default());
        let store = DryRunStore::new(inner.clone());

        assert!(store.existing_keys().await.unwrap().contains("X"));
        assert_eq!(store.schema().await.unwrap().columns(), ["sku".to_string()]);
        assert_eq!(store.table(), "products");
        assert_eq!(store.execute("INSERT INTO t VALUES ('a')").await.unwrap(), 0);
        assert!(inner.executed.lock().unwrap().is_empty());
    }
}
