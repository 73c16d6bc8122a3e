//! Bulk-insert statement synthesis
//!
//! Values are positional, so every tuple is aligned to the schema's column
//! order. A record lacking a column yields [`ColumnValue::Missing`], which the
//! configured [`MissingValuePolicy`] renders as `''`, `NULL`, or an error.

use serde::{Deserialize, Serialize};

use super::batcher::Batch;
use super::feed::models::FeedRecord;

/// Default ceiling on the encoded statement length in bytes.
pub const DEFAULT_MAX_STATEMENT_BYTES: usize = 256 * 1024;

/// Errors raised while synthesizing statements
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatementError {
    #[error("table schema has no columns")]
    EmptySchema,

    #[error("cannot build an insert statement for an empty batch")]
    EmptyBatch,

    #[error("record {sku} has no value for column {column}")]
    MissingField { sku: String, column: String },

    #[error("record {sku} alone encodes to {len} bytes, over the {max} byte limit")]
    RecordTooLarge { sku: String, len: usize, max: usize },
}

/// Ordered column names of the target table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// How a column absent from a record is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Legacy behaviour: an empty string literal, whatever the column type
    #[default]
    EmptyString,
    /// SQL `NULL`
    Null,
    /// Fail the statement
    Reject,
}

impl std::str::FromStr for MissingValuePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "empty_string" | "empty" | "legacy" => Ok(Self::EmptyString),
            "null" => Ok(Self::Null),
            "reject" | "error" => Ok(Self::Reject),
            other => Err(format!("Invalid missing value policy: {}", other)),
        }
    }
}

/// A record's value for one schema column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnValue<'a> {
    Text(&'a str),
    Missing,
}

/// Values of `record` in schema order
pub fn align<'r>(schema: &Schema, record: &'r FeedRecord) -> Vec<ColumnValue<'r>> {
    schema
        .columns()
        .iter()
        .map(|column| match record.get(column) {
            Some(value) => ColumnValue::Text(value),
            None => ColumnValue::Missing,
        })
        .collect()
}

/// Quote a SQL string literal, doubling embedded single quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote an identifier; dotted names are quoted per segment
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|segment| format!("\"{}\"", segment.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Builds `INSERT INTO ... VALUES ...` statements for one table
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    table: String,
    missing: MissingValuePolicy,
}

impl StatementBuilder {
    pub fn new(table: impl Into<String>, missing: MissingValuePolicy) -> Self {
        Self {
            table: table.into(),
            missing,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// One statement covering every record of `batch`
    pub fn build(&self, schema: &Schema, batch: &Batch) -> Result<String, StatementError> {
        self.build_records(schema, &batch.records)
    }

    /// Build one statement per slice of `batch`, splitting until each fits in
    /// `max_bytes`
    ///
    /// Order is preserved: concatenating the slices gives the batch back.
    pub fn build_bounded(
        &self,
        schema: &Schema,
        batch: &Batch,
        max_bytes: usize,
    ) -> Result<Vec<String>, StatementError> {
        let mut statements = Vec::new();
        self.build_split(schema, &batch.records, max_bytes, &mut statements)?;
        Ok(statements)
    }

    fn build_split(
        &self,
        schema: &Schema,
        records: &[FeedRecord],
        max_bytes: usize,
        out: &mut Vec<String>,
    ) -> Result<(), StatementError> {
        let statement = self.build_records(schema, records)?;
        if statement.len() <= max_bytes {
            out.push(statement);
            return Ok(());
        }

        if let [record] = records {
            return Err(StatementError::RecordTooLarge {
                sku: record.sku().to_string(),
                len: statement.len(),
                max: max_bytes,
            });
        }

        let (head, tail) = records.split_at(records.len() / 2);
        self.build_split(schema, head, max_bytes, out)?;
        self.build_split(schema, tail, max_bytes, out)
    }

    fn build_records(
        &self,
        schema: &Schema,
        records: &[FeedRecord],
    ) -> Result<String, StatementError> {
        if schema.is_empty() {
            return Err(StatementError::EmptySchema);
        }
        if records.is_empty() {
            return Err(StatementError::EmptyBatch);
        }

        let columns = schema
            .columns()
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut statement = format!(
            "INSERT INTO {} ({}) VALUES ",
            quote_identifier(&self.table),
            columns
        );

        for (index, record) in records.iter().enumerate() {
            if index > 0 {
                statement.push_str(", ");
            }
            self.write_tuple(&mut statement, schema, record)?;
        }

        Ok(statement)
    }

    fn write_tuple(
        &self,
        out: &mut String,
        schema: &Schema,
        record: &FeedRecord,
    ) -> Result<(), StatementError> {
        out.push('(');
        for (index, (value, column)) in align(schema, record)
            .into_iter()
            .zip(schema.columns())
            .enumerate()
        {
            if index > 0 {
                out.push_str(", ");
            }
            match value {
                ColumnValue::Text(text) => out.push_str(&quote_literal(text)),
                ColumnValue::Missing => match self.missing {
                    MissingValuePolicy::EmptyString => out.push_str("''"),
                    MissingValuePolicy::Null => out.push_str("NULL"),
                    MissingValuePolicy::Reject => {
                        return Err(StatementError::MissingField {
                            sku: record.sku().to_string(),
                            column: column.clone(),
                        })
                    },
                },
            }
        }
        out.push(')');
        Ok(())
    }
}
