use crate::strategy::PageType;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::error::Error;
use std::path::Path;

/// Value of one extracted field: a single string, or every match in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Many(Vec<String>),
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Single(value)
    }
}

/// One record of page content, keyed by field name in extraction order.
///
/// Elements that yield no field values fall back to a single `text` entry.
pub type ExtractedRecord = IndexMap<String, FieldValue>;

/// An image found on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
    pub alt: String,
}

/// A followable link found on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    pub href: String,
    pub text: String,
}

/// Everything extracted from one visited page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    pub title: String,
    pub page_type: PageType,
    pub metadata: IndexMap<String, String>,
    /// Embedded JSON-LD: one block as an object, several as an array
    pub structured_data: Option<serde_json::Value>,
    pub content: Vec<ExtractedRecord>,
    pub images: Vec<ImageRef>,
    pub links: Vec<LinkRef>,
    pub page_number: usize,
}

/// The JSON document a crawl produces.
///
/// A single visited page is emitted directly; several are wrapped in an
/// envelope with a page count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CrawlResult {
    Single {
        #[serde(flatten)]
        page: PageResult,
        #[serde(serialize_with = "serialize_timestamp")]
        scraped_at: DateTime<Utc>,
    },
    Paginated {
        url: String,
        title: String,
        total_pages: usize,
        pages: Vec<PageResult>,
        #[serde(serialize_with = "serialize_timestamp")]
        scraped_at: DateTime<Utc>,
    },
}

impl CrawlResult {
    /// Shapes the accumulated pages into the output document
    pub fn from_pages(start_url: &str, mut pages: Vec<PageResult>, scraped_at: DateTime<Utc>) -> Self {
        if pages.len() == 1 {
            if let Some(page) = pages.pop() {
                return CrawlResult::Single { page, scraped_at };
            }
        }
        CrawlResult::Paginated {
            url: start_url.to_string(),
            title: pages.first().map(|p| p.title.clone()).unwrap_or_default(),
            total_pages: pages.len(),
            pages,
            scraped_at,
        }
    }

    /// Pages contained in this result
    pub fn pages(&self) -> &[PageResult] {
        match self {
            CrawlResult::Single { page, .. } => std::slice::from_ref(page),
            CrawlResult::Paginated { pages, .. } => pages,
        }
    }

    /// Total number of content records across all pages
    pub fn total_records(&self) -> usize {
        self.pages().iter().map(|p| p.content.len()).sum()
    }

    /// Writes the result as pretty-printed JSON
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn serialize_timestamp<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn page(url: &str, number: usize) -> PageResult {
        let mut record = ExtractedRecord::new();
        record.insert("title".to_string(), FieldValue::from("Hello".to_string()));
        PageResult {
            url: url.to_string(),
            title: format!("Page {}", number),
            page_type: PageType::Article,
            metadata: IndexMap::new(),
            structured_data: None,
            content: vec![record],
            images: vec![],
            links: vec![],
            page_number: number,
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_single_page_is_emitted_directly() {
        let result = CrawlResult::from_pages("https://x.test/", vec![page("https://x.test/", 1)], fixed_time());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "url": "https://x.test/",
                "title": "Page 1",
                "page_type": "article",
                "metadata": {},
                "structured_data": null,
                "content": [{"title": "Hello"}],
                "images": [],
                "links": [],
                "page_number": 1,
                "scraped_at": "2024-05-01T12:30:00Z"
            })
        );
    }

    #[test]
    fn test_several_pages_are_wrapped() {
        let pages = vec![page("https://x.test/", 1), page("https://x.test/2", 2)];
        let result = CrawlResult::from_pages("https://x.test/", pages, fixed_time());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["total_pages"], json!(2));
        assert_eq!(value["title"], json!("Page 1"));
        assert_eq!(value["pages"][1]["page_number"], json!(2));
        assert_eq!(value["scraped_at"], json!("2024-05-01T12:30:00Z"));
        assert_eq!(result.total_records(), 2);
    }

    #[test]
    fn test_field_value_shapes() {
        let mut record = ExtractedRecord::new();
        record.insert("tag".to_string(), FieldValue::Many(vec!["a".into(), "b".into()]));
        record.insert("title".to_string(), FieldValue::Single("x".into()));
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"tag":["a","b"],"title":"x"}"#
        );
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let result = CrawlResult::from_pages("https://x.test/", vec![page("https://x.test/", 1)], fixed_time());
        result.write_to(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["content"][0]["title"], json!("Hello"));
    }
}
