use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose text never renders
const HIDDEN_TEXT_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Elements that start a new line of rendered text
const BLOCK_TAGS: [&str; 34] = [
    "address", "article", "aside", "blockquote", "br", "dd", "details", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr",
];

/// Rendered text of an element, whitespace collapsed and trimmed.
///
/// Inline markup does not split words; block boundaries separate them.
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    collect_text(element, &mut text);
    crate::utils::collapse_whitespace(&text)
}

fn collect_text(element: ElementRef<'_>, text: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(fragment) => text.push_str(fragment),
            Node::Element(child_element) => {
                let name = child_element.name();
                if HIDDEN_TEXT_TAGS.contains(&name) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    text.push(' ');
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(child_ref, text);
                }
                if block {
                    text.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Content of the document's `<title>`, trimmed
pub fn document_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

/// Parses a selector, returning `None` (and logging) when it is invalid
pub fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector.trim()) {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            ::log::debug!("Skipping invalid selector: {}", selector);
            None
        }
    }
}

/// Compiled `ignore_selectors` of a strategy
pub struct IgnoreList {
    selectors: Vec<Selector>,
}

impl IgnoreList {
    pub fn new(selectors: &[String]) -> Self {
        Self {
            selectors: selectors
                .iter()
                .filter(|s| !s.trim().is_empty())
                .filter_map(|s| parse_selector(s))
                .collect(),
        }
    }

    /// True if the element or any of its ancestors matches an ignore selector
    pub fn should_ignore(&self, element: ElementRef<'_>) -> bool {
        if self.selectors.is_empty() {
            return false;
        }
        std::iter::once(element)
            .chain(element.ancestors().filter_map(ElementRef::wrap))
            .any(|candidate| self.selectors.iter().any(|s| s.matches(&candidate)))
    }
}
