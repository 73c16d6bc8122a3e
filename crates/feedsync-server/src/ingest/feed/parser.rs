//! Product feed XML parser
//!
//! Streams the feed with `quick_xml::NsReader` and turns every
//! `rss > channel > item` element into a sanitized [`FeedItem`]. Namespaced
//! tags in the Google Base namespace are reduced to their local name; the
//! `id` and `link` tags are renamed to `sku` and `url`.
//!
//! A field whose text cannot be decoded is logged and dropped without losing
//! the rest of the item. Structural XML errors abort the parse.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use tracing::{debug, info, warn};

use super::models::{FeedItem, SKU_FIELD, URL_FIELD};
use crate::ingest::error::{IngestError, Result};

/// Namespace used by Google Merchant product feeds
pub const GOOGLE_BASE_NAMESPACE: &str = "http://base.google.com/ns/1.0";

/// Log a progress line every this many items.
const PROGRESS_INTERVAL: usize = 10_000;

/// Depth of the item elements: root (1) > container (2) > item (3).
const ITEM_DEPTH: usize = 3;
const FIELD_DEPTH: usize = ITEM_DEPTH + 1;

/// Remove embedded double quotes and line breaks, then trim
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '"' | '\n' | '\r'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Pending,
    Open,
    Closed,
}

#[derive(Debug)]
struct OpenField {
    name: String,
    text: String,
    defect: Option<String>,
}

/// Parser for product feeds
#[derive(Debug, Clone)]
pub struct FeedParser {
    namespace: String,
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new(GOOGLE_BASE_NAMESPACE)
    }
}

impl FeedParser {
    /// Create a parser that strips `namespace` from field tags
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Parse a whole feed document into items, in feed order
    pub fn parse(&self, xml: &str) -> Result<Vec<FeedItem>> {
        let mut reader = NsReader::from_str(xml);

        let mut items = Vec::new();
        let mut depth = 0usize;
        let mut saw_root = false;
        let mut container = Container::Pending;
        let mut item: Option<FeedItem> = None;
        let mut field: Option<OpenField> = None;

        loop {
            match reader.read_resolved_event()? {
                (ns, Event::Start(e)) => {
                    depth += 1;
                    saw_root = true;
                    match depth {
                        2 if container == Container::Pending => container = Container::Open,
                        ITEM_DEPTH if container == Container::Open && is_item(&e) => {
                            item = Some(FeedItem::new(items.len()));
                        },
                        FIELD_DEPTH if item.is_some() => {
                            field = Some(OpenField {
                                name: self.field_name(&ns, &e),
                                text: String::new(),
                                defect: None,
                            });
                        },
                        _ => {},
                    }
                },
                (_, Event::Empty(e)) => {
                    saw_root = true;
                    if depth + 1 == 2 && container == Container::Pending {
                        container = Container::Closed;
                    } else if depth + 1 == ITEM_DEPTH && container == Container::Open && is_item(&e)
                    {
                        let position = items.len();
                        Self::push_item(&mut items, FeedItem::new(position));
                    }
                },
                (_, Event::Text(t)) => {
                    if let (FIELD_DEPTH, Some(open)) = (depth, field.as_mut()) {
                        match t.unescape() {
                            Ok(text) => open.text.push_str(&text),
                            Err(e) => open.defect = Some(e.to_string()),
                        }
                    }
                },
                (_, Event::CData(c)) => {
                    if let (FIELD_DEPTH, Some(open)) = (depth, field.as_mut()) {
                        match std::str::from_utf8(&c) {
                            Ok(text) => open.text.push_str(text),
                            Err(e) => open.defect = Some(e.to_string()),
                        }
                    }
                },
                (_, Event::End(_)) => {
                    match depth {
                        FIELD_DEPTH => {
                            if let (Some(open), Some(current)) = (field.take(), item.as_mut()) {
                                apply_field(current, open);
                            }
                        },
                        ITEM_DEPTH => {
                            if let Some(done) = item.take() {
                                Self::push_item(&mut items, done);
                            }
                        },
                        2 if container == Container::Open => container = Container::Closed,
                        _ => {},
                    }
                    depth = depth.saturating_sub(1);
                },
                (_, Event::Eof) => break,
                _ => {},
            }
        }

        if !saw_root {
            return Err(IngestError::Xml("document has no root element".to_string()));
        }

        debug!("Parsed {} feed items", items.len());
        Ok(items)
    }

    fn push_item(items: &mut Vec<FeedItem>, item: FeedItem) {
        if item.position % PROGRESS_INTERVAL == 0 {
            info!("processing product index: {}", item.position);
        }
        items.push(item);
    }

    /// Bare field name for a tag; only the configured namespace is stripped
    fn field_name(&self, ns: &ResolveResult, e: &BytesStart) -> String {
        let strip = match ns {
            ResolveResult::Unbound => true,
            ResolveResult::Bound(Namespace(uri)) => *uri == self.namespace.as_bytes(),
            ResolveResult::Unknown(_) => false,
        };

        if strip {
            String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
        } else {
            String::from_utf8_lossy(e.name().as_ref()).into_owned()
        }
    }
}

fn is_item(e: &BytesStart) -> bool {
    e.name().as_ref() == b"item"
}

fn apply_field(item: &mut FeedItem, field: OpenField) {
    if let Some(error) = field.defect {
        warn!(
            position = item.position,
            field = %field.name,
            error = %error,
            "Error in appending product property to object, field dropped"
        );
        return;
    }

    let value = sanitize(&field.text);
    if value.is_empty() {
        debug!(position = item.position, field = %field.name, "Skipping empty field");
        return;
    }

    let name = match field.name.as_str() {
        "id" => SKU_FIELD,
        "link" => URL_FIELD,
        other => other,
    };
    item.fields.insert(name.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:g="http://base.google.com/ns/1.0" xmlns:x="urn:other">
  <channel>
    <title>Products</title>
    <item>
      <g:id>A1</g:id>
      <title>Red "Super" Shoe</title>
      <link>
        http://shop.example/a1
      </link>
      <g:brand>Acme</g:brand>
      <x:extra>kept qualified</x:extra>
    </item>
    <item>
      <g:id>B2</g:id>
      <g:shipping><g:country>US</g:country></g:shipping>
      <description><![CDATA[Line one
line two]]></description>
      <g:price>10 &amp; up</g:price>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_items_in_order() {
        let items = FeedParser::default().parse(FEED).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].position, 0);
        assert_eq!(items[0].sku(), Some("A1"));
        assert_eq!(items[1].sku(), Some("B2"));
    }

    #[test]
    fn test_renames_and_sanitizes() {
        let items = FeedParser::default().parse(FEED).unwrap();
        let first = &items[0].fields;

        assert_eq!(first.get("url").map(String::as_str), Some("http://shop.example/a1"));
        assert_eq!(first.get("title").map(String::as_str), Some("Red Super Shoe"));
        assert_eq!(first.get("brand").map(String::as_str), Some("Acme"));
        assert_eq!(first.get("x:extra").map(String::as_str), Some("kept qualified"));
        assert!(!first.contains_key("id"));
        assert!(!first.contains_key("link"));
    }

    #[test]
    fn test_cdata_entities_and_nested_fields() {
        let items = FeedParser::default().parse(FEED).unwrap();
        let second = &items[1].fields;

        assert_eq!(
            second.get("description").map(String::as_str),
            Some("Line oneline two")
        );
        assert_eq!(second.get("price").map(String::as_str), Some("10 & up"));
        // Container fields with only nested children carry no own text.
        assert!(!second.contains_key("shipping"));
        assert!(!second.contains_key("country"));
    }

    #[test]
    fn test_sanitize_strips_quotes_and_newlines() {
        assert_eq!(sanitize("  say \"hi\"\nthere \n"), "say hithere");
        assert_eq!(sanitize("\r\n"), "");
    }

    #[test]
    fn test_item_without_id_is_kept_without_sku() {
        let xml = r#"<rss><channel><item><title>No id</title></item><item/></channel></rss>"#;
        let items = FeedParser::default().parse(xml).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].sku(), None);
        assert_eq!(items[1].sku(), None);
    }

    #[test]
    fn test_self_closing_items_keep_their_positions() {
        let xml = r#"<rss><channel><item/><item><id>A</id></item><item/><item><id>B</id></item></channel></rss>"#;
        let items = FeedParser::default().parse(xml).unwrap();

        let positions: Vec<usize> = items.iter().map(|item| item.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
        assert_eq!(items[1].sku(), Some("A"));
        assert_eq!(items[3].sku(), Some("B"));
        assert!(items[0].fields.is_empty());
        assert!(items[2].fields.is_empty());
    }

    #[test]
    fn test_bad_entity_drops_only_that_field() {
        let xml = r#"<rss><channel><item><id>A1</id><title>bad &bogus; text</title><brand>Acme</brand></item></channel></rss>"#;
        let items = FeedParser::default().parse(xml).unwrap();

        assert_eq!(items[0].sku(), Some("A1"));
        assert!(!items[0].fields.contains_key("title"));
        assert_eq!(items[0].fields.get("brand").map(String::as_str), Some("Acme"));
    }

    #[test]
    fn test_only_first_container_is_read() {
        let xml = r#"<rss><channel><item><id>A</id></item></channel><channel><item><id>B</id></item></channel></rss>"#;
        let items = FeedParser::default().parse(xml).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sku(), Some("A"));
    }

    #[test]
    fn test_empty_channel_yields_no_items() {
        let items = FeedParser::default().parse("<rss><channel/></rss>").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_empty_document_is_an_error() {
        assert!(FeedParser::default().parse("").is_err());
    }

    #[test]
    fn test_mismatched_tags_are_an_error() {
        let xml = "<rss><channel><item><id>A</wrong></item></channel></rss>";
        assert!(FeedParser::default().parse(xml).is_err());
    }

    #[test]
    fn test_other_namespace_config() {
        let xml = r#"<rss xmlns:p="urn:products"><channel><item><p:id>Z9</p:id></item></channel></rss>"#;
        let items = FeedParser::new("urn:products").parse(xml).unwrap();
        assert_eq!(items[0].sku(), Some("Z9"));
    }
}
