//! Strategy-driven extraction over a DOM snapshot.
//!
//! Given the page markup and a decoded [`Strategy`], builds a [`PageResult`]:
//! metadata, JSON-LD, content records, images and links. Only an empty
//! content list is an error; every selector problem is skipped locally.

pub mod dom;

#[cfg(test)]
mod tests;

use crate::error::ExtractError;
use crate::filter;
use crate::results::{ExtractedRecord, FieldValue, ImageRef, LinkRef, PageResult};
use crate::strategy::{ExtractionField, Strategy};
use dom::IgnoreList;
use indexmap::IndexMap;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Minimum length of an item's whole text to be kept as a fallback record
const MIN_FALLBACK_TEXT_CHARS: usize = 3;

/// Extracts one page according to `strategy`.
///
/// `title` comes from the driver so browser-side title changes are honoured;
/// when empty, the document's `<title>` is used.
pub fn extract_page(
    html: &str,
    page_url: &Url,
    title: &str,
    strategy: &Strategy,
    page_number: usize,
) -> Result<PageResult, ExtractError> {
    let document = Html::parse_document(html);
    let ignore = IgnoreList::new(&strategy.ignore_selectors);

    let content = extract_content(&document, strategy, &ignore);
    if content.is_empty() {
        return Err(ExtractError::NoContent {
            strategy: strategy.excerpt(300),
        });
    }

    let title = if title.trim().is_empty() {
        dom::document_title(&document)
    } else {
        title.trim().to_string()
    };

    Ok(PageResult {
        url: page_url.to_string(),
        title,
        page_type: strategy.page_type,
        metadata: extract_metadata(&document),
        structured_data: extract_structured_data(&document),
        content,
        images: extract_images(&document, page_url, &ignore),
        links: extract_links(&document, page_url, &ignore),
        page_number,
    })
}

/// Runs exactly one branch of the content fallback chain
pub fn extract_content(document: &Html, strategy: &Strategy, ignore: &IgnoreList) -> Vec<ExtractedRecord> {
    let fields = &strategy.extraction_fields;
    if let Some(items) = strategy.items_selector() {
        extract_list_items(document, items, fields, ignore)
    } else if let Some(container) = strategy.main_container() {
        extract_from_container(document, container, fields, ignore)
    } else {
        extract_fields_global(document, fields, ignore)
    }
}

/// One record per list item; items with no field values fall back to their text
fn extract_list_items(
    document: &Html,
    items_selector: &str,
    fields: &[ExtractionField],
    ignore: &IgnoreList,
) -> Vec<ExtractedRecord> {
    let Some(selector) = dom::parse_selector(items_selector) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    let mut matched = 0usize;
    for item in document.select(&selector) {
        matched += 1;
        if ignore.should_ignore(item) {
            continue;
        }

        let mut record = fields_within(item, fields, ignore);
        if record.is_empty() {
            let text = dom::element_text(item);
            if text.chars().count() >= MIN_FALLBACK_TEXT_CHARS {
                record.insert("text".to_string(), FieldValue::Single(text));
            }
        }
        if !record.is_empty() {
            records.push(record);
        }
    }
    ::log::info!("Items: {} matched, {} kept (selector: {})", matched, records.len(), items_selector);
    records
}

/// A single record from the main container, or the container text, or a global pass
fn extract_from_container(
    document: &Html,
    container_selector: &str,
    fields: &[ExtractionField],
    ignore: &IgnoreList,
) -> Vec<ExtractedRecord> {
    let container = dom::parse_selector(container_selector)
        .and_then(|selector| document.select(&selector).next());
    let Some(container) = container else {
        ::log::info!("Main container not found: {}", container_selector);
        return extract_fields_global(document, fields, ignore);
    };

    let record = fields_within(container, fields, ignore);
    if !record.is_empty() {
        return vec![record];
    }

    let text = dom::element_text(container);
    if !text.is_empty() {
        let mut record = ExtractedRecord::new();
        record.insert("text".to_string(), FieldValue::Single(text));
        return vec![record];
    }
    extract_fields_global(document, fields, ignore)
}

/// At most one record: each field takes every non-ignored match in the document
fn extract_fields_global(
    document: &Html,
    fields: &[ExtractionField],
    ignore: &IgnoreList,
) -> Vec<ExtractedRecord> {
    let mut record = ExtractedRecord::new();
    for field in fields.iter().filter(|f| f.is_usable()) {
        let Some(selector) = dom::parse_selector(&field.selector) else {
            continue;
        };
        let mut values: Vec<String> = document
            .select(&selector)
            .filter(|el| !ignore.should_ignore(*el))
            .filter_map(|el| field_value(el, field))
            .collect();

        match values.len() {
            0 => {}
            1 => {
                record.insert(field.name.clone(), FieldValue::Single(values.remove(0)));
            }
            _ => {
                record.insert(field.name.clone(), FieldValue::Many(values));
            }
        }
    }

    if record.is_empty() { Vec::new() } else { vec![record] }
}

/// Evaluates each field against the first non-ignored match inside `scope`
fn fields_within(scope: ElementRef<'_>, fields: &[ExtractionField], ignore: &IgnoreList) -> ExtractedRecord {
    let mut record = ExtractedRecord::new();
    for field in fields.iter().filter(|f| f.is_usable()) {
        let Some(selector) = dom::parse_selector(&field.selector) else {
            continue;
        };
        let value = scope
            .select(&selector)
            .find(|el| !ignore.should_ignore(*el))
            .and_then(|el| field_value(el, field));
        if let Some(value) = value {
            record.insert(field.name.clone(), FieldValue::Single(value));
        }
    }
    record
}

/// Attribute value or element text; `None` when empty
fn field_value(element: ElementRef<'_>, field: &ExtractionField) -> Option<String> {
    let value = match field.attribute() {
        Some(attribute) => element.value().attr(attribute).unwrap_or_default().trim().to_string(),
        None => dom::element_text(element),
    };
    (!value.is_empty()).then_some(value)
}

/// `<meta>` tags with a name or property and a content attribute
pub fn extract_metadata(document: &Html) -> IndexMap<String, String> {
    let mut metadata = IndexMap::new();
    let Ok(selector) = Selector::parse("meta[name], meta[property]") else {
        return metadata;
    };
    for meta in document.select(&selector) {
        let element = meta.value();
        let name = element
            .attr("name")
            .filter(|n| !n.is_empty())
            .or_else(|| element.attr("property"))
            .unwrap_or_default();
        let content = element.attr("content").unwrap_or_default();
        if !name.is_empty() && !content.is_empty() {
            metadata.insert(name.to_string(), content.to_string());
        }
    }
    metadata
}

/// Embedded JSON-LD blocks; unparseable blocks are skipped
pub fn extract_structured_data(document: &Html) -> Option<serde_json::Value> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    let mut blocks: Vec<serde_json::Value> = document
        .select(&selector)
        .filter_map(|script| {
            let raw = script.text().collect::<String>();
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return None;
            }
            match serde_json::from_str(trimmed) {
                Ok(value) => Some(value),
                Err(e) => {
                    ::log::debug!("Skipping malformed JSON-LD block: {}", e);
                    None
                }
            }
        })
        .collect();

    match blocks.len() {
        0 => None,
        1 => blocks.pop(),
        _ => Some(serde_json::Value::Array(blocks)),
    }
}

/// Non-ignored images with absolute, de-duplicated URLs
pub fn extract_images(document: &Html, page_url: &Url, ignore: &IgnoreList) -> Vec<ImageRef> {
    let Ok(selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut images = Vec::new();
    for img in document.select(&selector) {
        if ignore.should_ignore(img) {
            continue;
        }
        let src = img.value().attr("src").unwrap_or_default().trim();
        if src.is_empty() || src.starts_with("data:") {
            continue;
        }
        let resolved = page_url
            .join(src)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| src.to_string());
        if !seen.insert(resolved.clone()) {
            continue;
        }
        images.push(ImageRef {
            src: resolved,
            alt: img.value().attr("alt").unwrap_or_default().to_string(),
        });
    }
    images
}

/// Non-ignored links with visible text, resolved and de-duplicated
pub fn extract_links(document: &Html, page_url: &Url, ignore: &IgnoreList) -> Vec<LinkRef> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&selector) {
        if ignore.should_ignore(anchor) {
            continue;
        }
        let href = anchor.value().attr("href").unwrap_or_default();
        let Some(resolved) = filter::resolve_href(page_url, href) else {
            continue;
        };
        let text = dom::element_text(anchor);
        if text.is_empty() {
            continue;
        }
        let href = resolved.to_string();
        if seen.insert(href.clone()) {
            links.push(LinkRef { href, text });
        }
    }
    links
}
