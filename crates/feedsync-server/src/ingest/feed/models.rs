//! Feed data models

use std::collections::BTreeMap;

use crate::ingest::context::RunContext;

/// Field name the feed identifier is renamed to
pub const SKU_FIELD: &str = "sku";
/// Field name the feed link is renamed to
pub const URL_FIELD: &str = "url";
pub const VERSION_FIELD: &str = "version";
pub const DATE_ADDED_FIELD: &str = "date_added";
pub const IS_NEW_FIELD: &str = "is_new";

/// One sanitized feed item, before classification
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedItem {
    /// Zero-based position of the item in the feed
    pub position: usize,
    pub fields: BTreeMap<String, String>,
}

impl FeedItem {
    pub fn new(position: usize) -> Self {
        Self {
            position,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// The identifier, if the item carried a non-empty one
    pub fn sku(&self) -> Option<&str> {
        self.fields
            .get(SKU_FIELD)
            .map(String::as_str)
            .filter(|sku| !sku.is_empty())
    }
}

/// Whether a record's identifier was already in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    New,
    Known,
}

/// A classified feed record
///
/// Built only by the reconciler; the classification cannot change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRecord {
    sku: String,
    fields: BTreeMap<String, String>,
    version: String,
    date_added: String,
    classification: Classification,
}

impl FeedRecord {
    pub(crate) fn from_item(
        item: FeedItem,
        sku: String,
        classification: Classification,
        version: &str,
        ctx: &RunContext,
    ) -> Self {
        let mut fields = item.fields;
        fields.remove(SKU_FIELD);
        // Run-level tags take precedence over same-named feed fields.
        fields.remove(VERSION_FIELD);
        fields.remove(DATE_ADDED_FIELD);
        fields.remove(IS_NEW_FIELD);

        Self {
            sku,
            fields,
            version: version.to_string(),
            date_added: ctx.date_added.clone(),
            classification,
        }
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn url(&self) -> Option<&str> {
        self.fields.get(URL_FIELD).map(String::as_str)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn date_added(&self) -> &str {
        &self.date_added
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn is_new(&self) -> bool {
        self.classification == Classification::New
    }

    /// Look a column up by name, covering both the fixed and passthrough fields
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            SKU_FIELD => Some(&self.sku),
            VERSION_FIELD => Some(&self.version),
            DATE_ADDED_FIELD => Some(&self.date_added),
            IS_NEW_FIELD => Some(if self.is_new() { "true" } else { "false" }),
            other => self.fields.get(other).map(String::as_str),
        }
    }

    /// Passthrough fields (everything except the fixed run tags and sku)
    pub fn passthrough(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
