//! Extraction boundary
//!
//! An [`Extractor`] turns a fetched page into zero or more items. The default
//! [`PageExtractor`] emits a single item describing the page itself.

use crate::pipeline::fetcher::{sha256_hex, FetchedPage};
use scraper::{Html, Selector};
use serde_json::{json, Map, Value};

/// One structured record produced from a page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedItem {
    pub item_url: String,
    pub title: Option<String>,
    pub metadata: Map<String, Value>,
    /// Fingerprint of the extracted payload, used for change detection
    pub content_hash: String,
}

impl ExtractedItem {
    /// Builds an item and fingerprints its payload
    ///
    /// The hash covers the URL, title and metadata serialized as JSON with
    /// sorted keys, so equal payloads always hash equally.
    pub fn new(item_url: String, title: Option<String>, metadata: Map<String, Value>) -> Self {
        let payload = json!({
            "item_url": item_url,
            "title": title,
            "metadata": metadata,
        });
        let content_hash = sha256_hex(payload.to_string().as_bytes());

        Self {
            item_url,
            title,
            metadata,
            content_hash,
        }
    }
}

/// Turns raw fetched bytes into items
pub trait Extractor: Send + Sync {
    fn extract(&self, page: &FetchedPage) -> Vec<ExtractedItem>;
}

/// Default extractor: one item per page with title and description
#[derive(Debug, Default, Clone, Copy)]
pub struct PageExtractor;

impl Extractor for PageExtractor {
    fn extract(&self, page: &FetchedPage) -> Vec<ExtractedItem> {
        let text = String::from_utf8_lossy(&page.body);
        let document = Html::parse_document(&text);

        let mut metadata = Map::new();
        metadata.insert("content_length".to_string(), Value::from(page.size));
        if let Some(content_type) = &page.content_type {
            metadata.insert("content_type".to_string(), Value::from(content_type.as_str()));
        }
        if let Some(description) = extract_description(&document) {
            metadata.insert("description".to_string(), Value::from(description));
        }

        vec![ExtractedItem::new(
            page.url.clone(),
            extract_title(&document),
            metadata,
        )]
    }
}

/// Extracts the `<title>` text with whitespace collapsed
fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|title| !title.is_empty())
}

fn extract_description(document: &Html) -> Option<String> {
    let selector = Selector::parse("meta[name='description'][content]").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|description| !description.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
