use serde::{Deserialize, Deserializer, Serialize};

/// Kind of page the oracle believes it is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    BlogListing,
    Article,
    ProductPage,
    ForumThread,
    News,
    Portfolio,
    #[default]
    #[serde(other)]
    Generic,
}

/// CSS selectors locating the main content of a page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSelectors {
    #[serde(default)]
    pub main_container: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// Selector for repeated items on listing pages
    #[serde(default)]
    pub items: Option<String>,
}

/// How to reach the next page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub next_selector: Option<String>,
}

/// One named value to pull out of the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionField {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub selector: String,
    /// Attribute to read instead of the element text
    #[serde(default)]
    pub attribute: Option<String>,
}

impl ExtractionField {
    /// Fields without a name or selector are skipped during extraction
    pub fn is_usable(&self) -> bool {
        !self.name.trim().is_empty() && !self.selector.trim().is_empty()
    }

    /// Attribute to read, treating an empty string as "use the text"
    pub fn attribute(&self) -> Option<&str> {
        non_empty(&self.attribute)
    }
}

/// Extraction plan proposed by the strategy oracle.
///
/// Every key is optional in the oracle's output; missing or `null` keys fall
/// back to their defaults (generic page, no selectors, no pagination).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(default, deserialize_with = "null_as_default")]
    pub page_type: PageType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_selectors: ContentSelectors,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pagination: Pagination,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ignore_selectors: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub extraction_fields: Vec<ExtractionField>,
}

impl Strategy {
    pub fn items_selector(&self) -> Option<&str> {
        non_empty(&self.content_selectors.items)
    }

    pub fn main_container(&self) -> Option<&str> {
        non_empty(&self.content_selectors.main_container)
    }

    pub fn next_selector(&self) -> Option<&str> {
        non_empty(&self.pagination.next_selector)
    }

    /// Short JSON rendering for diagnostics
    pub fn excerpt(&self, max_chars: usize) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        crate::utils::truncate_chars(&json, max_chars)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_use_defaults() {
        let strategy: Strategy = serde_json::from_str("{}").unwrap();
        assert_eq!(strategy.page_type, PageType::Generic);
        assert!(strategy.ignore_selectors.is_empty());
        assert!(strategy.extraction_fields.is_empty());
        assert!(strategy.next_selector().is_none());
        assert!(strategy.items_selector().is_none());
    }

    #[test]
    fn test_null_keys_use_defaults() {
        let json = r#"{
            "page_type": null,
            "content_selectors": null,
            "pagination": {"next_selector": null},
            "ignore_selectors": null,
            "extraction_fields": null
        }"#;
        let strategy: Strategy = serde_json::from_str(json).unwrap();
        assert_eq!(strategy, Strategy::default());
    }

    #[test]
    fn test_unknown_page_type_is_generic() {
        let strategy: Strategy = serde_json::from_str(r#"{"page_type": "recipe"}"#).unwrap();
        assert_eq!(strategy.page_type, PageType::Generic);

        let strategy: Strategy = serde_json::from_str(r#"{"page_type": "blog_listing"}"#).unwrap();
        assert_eq!(strategy.page_type, PageType::BlogListing);
    }

    #[test]
    fn test_empty_selectors_count_as_absent() {
        let json = r#"{
            "content_selectors": {"items": "  ", "main_container": "article"},
            "pagination": {"next_selector": ""}
        }"#;
        let strategy: Strategy = serde_json::from_str(json).unwrap();
        assert!(strategy.items_selector().is_none());
        assert_eq!(strategy.main_container(), Some("article"));
        assert!(strategy.next_selector().is_none());
    }

    #[test]
    fn test_field_usability() {
        let field = ExtractionField {
            name: "date".to_string(),
            selector: "time".to_string(),
            attribute: Some(String::new()),
        };
        assert!(field.is_usable());
        assert!(field.attribute().is_none());

        let nameless = ExtractionField {
            selector: "h1".to_string(),
            ..ExtractionField::default()
        };
        assert!(!nameless.is_usable());
    }

    #[test]
    fn test_null_field_members_make_the_field_unusable() {
        let strategy: Strategy = serde_json::from_str(
            r#"{"extraction_fields": [
                {"name": "x", "selector": null},
                {"name": null, "selector": "h1"},
                {"name": "title", "selector": "h1", "attribute": null}
            ]}"#,
        )
        .unwrap();
        let usable: Vec<_> = strategy.extraction_fields.iter().filter(|f| f.is_usable()).collect();
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].name, "title");
        assert_eq!(strategy.extraction_fields[0].selector, "");
    }
}
