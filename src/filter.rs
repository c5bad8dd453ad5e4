use std::collections::HashSet;
use url::Url;

/// Whether an href can be followed at all (not a fragment or script pseudo-URL)
pub fn is_followable_href(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return false;
    }
    !href
        .get(..11)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("javascript:"))
}

/// Resolves an href against the page URL, rejecting unfollowable ones
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    if !is_followable_href(href) {
        return None;
    }
    base.join(href.trim()).ok()
}

/// Whether two URLs point at the same host (and port)
pub fn is_same_host(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// Normalizes a URL for visit deduplication.
///
/// Query string and fragment are dropped, as is any trailing slash, so
/// `https://x.test/a?p=1#f` and `https://x.test/a/` are the same page.
pub fn normalize_url(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].trim_end_matches('/').to_string()
}

/// Set of pages already visited during one crawl.
///
/// Entries are only ever added, which bounds the crawl loop.
#[derive(Debug, Default)]
pub struct VisitedUrls {
    seen: HashSet<String>,
}

impl VisitedUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the URL normalizes to an already visited page
    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(&normalize_url(url))
    }

    /// Marks a URL as visited; returns false if it was already known
    pub fn insert(&mut self, url: &str) -> bool {
        self.seen.insert(normalize_url(url))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("https://x.test/a?p=1#f"), "https://x.test/a");
        assert_eq!(normalize_url("https://x.test/a/"), "https://x.test/a");
        assert_eq!(normalize_url("https://x.test/a#frag?not-query"), "https://x.test/a");
        assert_eq!(normalize_url("https://x.test/"), "https://x.test");
    }

    #[test]
    fn test_visited_treats_normalized_urls_as_repeats() {
        let mut visited = VisitedUrls::new();
        assert!(visited.insert("https://x.test/a?p=1#f"));
        assert!(visited.contains("https://x.test/a/"));
        assert!(!visited.insert("https://x.test/a/"));
        assert_eq!(visited.len(), 1);

        assert!(visited.insert("https://x.test/b"));
        assert_eq!(visited.len(), 2);
    }

    #[test]
    fn test_followable_hrefs() {
        assert!(is_followable_href("/page/2"));
        assert!(is_followable_href("https://other.test/"));
        assert!(!is_followable_href("#top"));
        assert!(!is_followable_href("  #top"));
        assert!(!is_followable_href("javascript:void(0)"));
        assert!(!is_followable_href("JavaScript:load()"));
        assert!(!is_followable_href(""));
    }

    #[test]
    fn test_resolve_href() {
        let base = Url::parse("https://x.test/blog/page/1").unwrap();
        assert_eq!(
            resolve_href(&base, "../2").unwrap().as_str(),
            "https://x.test/blog/2"
        );
        assert_eq!(
            resolve_href(&base, "?page=2").unwrap().as_str(),
            "https://x.test/blog/page/1?page=2"
        );
        assert!(resolve_href(&base, "#comments").is_none());
    }

    #[test]
    fn test_same_host() {
        let a = Url::parse("https://x.test/a").unwrap();
        let b = Url::parse("https://x.test:443/b").unwrap();
        let c = Url::parse("https://y.test/a").unwrap();
        let d = Url::parse("http://x.test:8080/a").unwrap();
        assert!(is_same_host(&a, &b));
        assert!(!is_same_host(&a, &c));
        assert!(!is_same_host(&a, &d));
    }
}
