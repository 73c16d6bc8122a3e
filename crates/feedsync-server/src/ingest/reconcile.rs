//! Reconciliation of parsed feed items against the existing identifier set

use std::collections::HashSet;

use tracing::{info, warn};

use super::context::RunContext;
use super::feed::models::{Classification, FeedItem, FeedRecord};

/// Identifiers already present in the store, read once per run
#[derive(Debug, Clone, Default)]
pub struct ExistingKeys {
    keys: HashSet<String>,
}

impl ExistingKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, sku: &str) -> bool {
        self.keys.contains(sku)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// NEW iff the identifier is absent from the set
    pub fn classify(&self, sku: &str) -> Classification {
        if self.contains(sku) {
            Classification::Known
        } else {
            Classification::New
        }
    }
}

/// Output of [`reconcile`]
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// NEW records in feed order
    pub new: Vec<FeedRecord>,
    /// KNOWN records, kept for counting only
    pub known: Vec<FeedRecord>,
    /// Feed positions of items dropped for lacking an identifier
    pub defective: Vec<usize>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty()
    }
}

/// Classify every item exactly once and split NEW from KNOWN
pub fn reconcile(
    items: Vec<FeedItem>,
    existing: &ExistingKeys,
    version: &str,
    ctx: &RunContext,
) -> Reconciliation {
    let mut out = Reconciliation::default();

    for item in items {
        let Some(sku) = item.sku().map(str::to_string) else {
            warn!(position = item.position, "Feed item has no identifier, skipping");
            out.defective.push(item.position);
            continue;
        };

        let classification = existing.classify(&sku);
        let record = FeedRecord::from_item(item, sku, classification, version, ctx);
        match classification {
            Classification::New => out.new.push(record),
            Classification::Known => out.known.push(record),
        }
    }

    info!(
        "found {} new products and {} existing products ({} defective)",
        out.new.len(),
        out.known.len(),
        out.defective.len()
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(skus: &[&str]) -> Vec<FeedItem> {
        skus.iter()
            .enumerate()
            .map(|(i, sku)| FeedItem::new(i).with_field("sku", *sku))
            .collect()
    }

    fn skus(records: &[FeedRecord]) -> Vec<&str> {
        records.iter().map(FeedRecord::sku).collect()
    }

    #[test]
    fn test_three_items_one_known() {
        let ctx = RunContext::new("feed.xml");
        let result = reconcile(items(&["X", "Y", "Z"]), &ExistingKeys::new(["X"]), "4", &ctx);

        assert_eq!(skus(&result.new), vec!["Y", "Z"]);
        assert_eq!(skus(&result.known), vec!["X"]);
        assert!(result.new.iter().all(FeedRecord::is_new));
        assert!(result.known.iter().all(|r| !r.is_new()));
    }

    #[test]
    fn test_counts_add_up() {
        let ctx = RunContext::new("feed.xml");
        for n in [0usize, 1, 200, 201] {
            let names: Vec<String> = (0..n).map(|i| format!("SKU{i}")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            // every third identifier is already known, with duplicates in the index
            let known = ExistingKeys::new(
                names.iter().step_by(3).chain(names.iter().step_by(3)).cloned(),
            );

            let result = reconcile(items(&refs), &known, "4", &ctx);

            assert_eq!(result.new.len() + result.known.len(), n);
            for record in result.new.iter().chain(result.known.iter()) {
                assert_eq!(record.is_new(), !known.contains(record.sku()));
            }
        }
    }

    #[test]
    fn test_empty_index_makes_everything_new() {
        let ctx = RunContext::new("feed.xml");
        let result = reconcile(items(&["A", "B"]), &ExistingKeys::default(), "4", &ctx);
        assert_eq!(result.new.len(), 2);
        assert!(result.known.is_empty());
    }

    #[test]
    fn test_items_without_sku_are_defective() {
        let ctx = RunContext::new("feed.xml");
        let feed = vec![
            FeedItem::new(0).with_field("sku", "A"),
            FeedItem::new(1).with_field("title", "orphan"),
            FeedItem::new(2).with_field("sku", "B"),
        ];

        let result = reconcile(feed, &ExistingKeys::default(), "4", &ctx);

        assert_eq!(skus(&result.new), vec!["A", "B"]);
        assert_eq!(result.defective, vec![1]);
    }

    #[test]
    fn test_records_share_run_timestamp() {
        let ctx = RunContext::new("feed.xml");
        let result = reconcile(items(&["A", "B"]), &ExistingKeys::default(), "4", &ctx);
        assert!(result.new.iter().all(|r| r.date_added() == ctx.date_added));
        assert!(result.new.iter().all(|r| r.version() == "4"));
    }
}
