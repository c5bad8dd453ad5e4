//! Compact page digest sent to the strategy oracle.

use crate::extract::dom;
use crate::utils::truncate_chars;
use indexmap::IndexMap;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

const MAX_SAMPLE_HTML_CHARS: usize = 4000;
const MAX_VISIBLE_TEXT_CHARS: usize = 500;
const MAX_LISTED: usize = 20;
const MAX_NAME_CHARS: usize = 50;

/// Subtrees that carry no structure worth showing the oracle
const STRIPPED_TAGS: &str = "script, style, noscript, svg, iframe";

/// Element statistics of the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomStats {
    pub total_elements: usize,
    /// Tag name counts in first-seen order
    pub tag_counts: IndexMap<String, usize>,
    /// Most frequent class names, rendered as `name(count)`
    pub common_classes: Vec<String>,
    /// First element ids in document order
    pub ids: Vec<String>,
}

/// What the oracle sees of a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub url: String,
    pub title: String,
    pub dom_stats: DomStats,
    pub sample_html: String,
    pub visible_text_sample: String,
}

/// Builds the summary of `html` as found at `url`
pub fn summarize(html: &str, url: &str, title: &str) -> PageSummary {
    let mut document = Html::parse_document(html);
    let title = if title.trim().is_empty() {
        dom::document_title(&document)
    } else {
        title.trim().to_string()
    };

    let dom_stats = dom_stats(&document);
    strip_subtrees(&mut document);

    PageSummary {
        url: url.to_string(),
        title,
        dom_stats,
        sample_html: truncate_chars(&document.root_element().html(), MAX_SAMPLE_HTML_CHARS),
        visible_text_sample: visible_text(&document),
    }
}

fn dom_stats(document: &Html) -> DomStats {
    let Ok(all) = Selector::parse("*") else {
        return DomStats::default();
    };

    let mut stats = DomStats::default();
    let mut class_counts: IndexMap<&str, usize> = IndexMap::new();
    for element in document.select(&all) {
        let element = element.value();
        stats.total_elements += 1;
        *stats.tag_counts.entry(element.name().to_string()).or_insert(0) += 1;

        for class in element.attr("class").unwrap_or_default().split_whitespace() {
            let len = class.chars().count();
            if len > 1 && len < MAX_NAME_CHARS {
                *class_counts.entry(class).or_insert(0) += 1;
            }
        }

        if stats.ids.len() < MAX_LISTED {
            if let Some(id) = element.id() {
                if !id.is_empty() && id.chars().count() < MAX_NAME_CHARS {
                    stats.ids.push(id.to_string());
                }
            }
        }
    }

    stats.common_classes = top_counts(class_counts, MAX_LISTED)
        .into_iter()
        .map(|(class, count)| format!("{}({})", class, count))
        .collect();
    stats
}

/// Highest counts first; equal counts keep first-seen order
fn top_counts<K>(counts: IndexMap<K, usize>, limit: usize) -> Vec<(K, usize)> {
    let mut entries: Vec<(K, usize)> = counts.into_iter().collect();
    // sort_by is stable, so insertion order breaks ties
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(limit);
    entries
}

fn strip_subtrees(document: &mut Html) {
    let Ok(selector) = Selector::parse(STRIPPED_TAGS) else {
        return;
    };
    let ids: Vec<_> = document.select(&selector).map(|element| element.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn visible_text(document: &Html) -> String {
    let Ok(body) = Selector::parse("body") else {
        return String::new();
    };
    document
        .select(&body)
        .next()
        .map(|body| truncate_chars(&dom::element_text(body), MAX_VISIBLE_TEXT_CHARS))
        .unwrap_or_default()
}
