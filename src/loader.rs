//! Dynamic content loader: clicks "load more" style controls and scrolls
//! until the page stops growing.
//!
//! Every driver failure in here is logged and swallowed. The worst outcome of
//! a load pass is that nothing was revealed.

use crate::config::LoaderConfig;
use crate::drivers::{ClickMode, PageDriver};
use crate::error::DriverError;
use crate::utils::truncate_chars;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Button captions that reveal more content, in priority order
const LOAD_MORE_PHRASES: &[&str] = &[
    "もっと見る",
    "続きを表示",
    "続きを読む",
    "さらに表示",
    "全て表示",
    "すべて表示",
    "もっと読む",
    "詳細を表示",
    "レビューをもっと見る",
    "もっと読み込む",
    "追加で表示",
    r"show\s*more",
    r"load\s*more",
    r"see\s*more",
    r"view\s*more",
    r"read\s*more",
    r"show\s*all",
    r"view\s*all",
    r"see\s*all",
    r"load\s*more\s*comments",
    r"more\s*replies",
];

/// Widgets that look like "load more" controls regardless of caption
const LOAD_MORE_SELECTORS: &[&str] = &[
    r#"button[class*="more"]"#,
    r#"button[class*="load"]"#,
    r#"a[class*="more"]"#,
    r#"a[class*="load"]"#,
    r#"button[class*="expand"]"#,
    r#"[class*="show-more"]"#,
    r#"[class*="showMore"]"#,
    r#"[class*="load-more"]"#,
    r#"[class*="loadMore"]"#,
    r#"[data-action="load-more"]"#,
    r#"[data-click="loadMore"]"#,
];

/// Consent banner captions; rejecting is preferred over accepting.
/// Short English words must be the whole caption so ordinary links
/// ("Cookie policy", "Book now") never match.
const COOKIE_PHRASES: &[&str] = &[
    "拒否",
    "すべて拒否",
    r"\breject\s*all\b",
    r"\bdecline\b",
    "閉じる",
    r"^\s*close\s*$",
    r"\bdismiss\b",
    "同意",
    "承認",
    r"\baccept\b",
    r"\bagree\b",
    r"\bgot\s*it\b",
    r"^\s*ok(ay)?\s*[.!]?\s*$",
];

const BUTTON_SELECTOR: &str = "button, [role='button']";
const COOKIE_CONTROL_SELECTOR: &str = "button, a, [role='button']";
const COOKIE_SETTLE: Duration = Duration::from_millis(500);

const HEIGHT_SCRIPT: &str = "return document.body ? document.body.scrollHeight : 0;";

/// Removes positioned modal/overlay elements and empties full-screen layer
/// containers
pub const DISMISS_OVERLAYS_SCRIPT: &str = r#"
const layers = document.querySelector('#layers');
if (layers) {
    while (layers.firstChild) {
        layers.removeChild(layers.firstChild);
    }
}
const selectors = [
    '[class*="overlay"]', '[class*="modal"]', '[class*="popup"]',
    '[class*="dialog"]', '[role="dialog"]',
];
let removed = 0;
for (const sel of selectors) {
    document.querySelectorAll(sel).forEach(el => {
        const style = window.getComputedStyle(el);
        if (style.position === 'fixed' || style.position === 'absolute') {
            el.remove();
            removed += 1;
        }
    });
}
return removed;
"#;

static LOAD_MORE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(LOAD_MORE_PHRASES));
static COOKIE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(COOKIE_PHRASES));

fn compile(phrases: &[&str]) -> Vec<Regex> {
    phrases
        .iter()
        .filter_map(|phrase| Regex::new(&format!("(?i){}", phrase)).ok())
        .collect()
}

/// What one load pass achieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Successful clicks on reveal controls
    pub clicks: usize,
    /// Whether the document height changed in any iteration
    pub height_changed: bool,
}

impl LoadOutcome {
    /// Whether the pass revealed anything at all
    pub fn made_progress(&self) -> bool {
        self.clicks > 0 || self.height_changed
    }
}

/// Reveals staged content on the current page.
///
/// Inert (returns an empty outcome) on backends that cannot run scripts or
/// interact with the page.
pub async fn load_dynamic_content<D: PageDriver>(driver: &mut D, config: &LoaderConfig) -> LoadOutcome {
    let capabilities = driver.capabilities();
    if !capabilities.interaction || !capabilities.scripting {
        ::log::debug!("Backend cannot interact with the page, skipping dynamic loading");
        return LoadOutcome::default();
    }

    let mut outcome = LoadOutcome::default();
    let mut unchanged = 0;

    for iteration in 1..=config.max_iterations {
        let before = document_height(driver).await;

        let mut clicked = click_phrase_control(driver, config).await;
        if !clicked {
            clicked = click_selector_control(driver, config).await;
        }
        if clicked {
            outcome.clicks += 1;
            ::log::info!("Clicked reveal control (#{})", outcome.clicks);
        } else if let Err(e) = driver.scroll_to_bottom().await {
            ::log::debug!("Scroll failed: {}", e);
        }
        tokio::time::sleep(config.settle()).await;

        let after = document_height(driver).await;
        let grew = before != after;
        outcome.height_changed |= grew;

        if clicked || grew {
            unchanged = 0;
        } else {
            unchanged += 1;
            if unchanged >= config.stable_iterations {
                ::log::debug!("Page stable after {} load iterations", iteration);
                break;
            }
        }
    }

    ::log::info!(
        "Dynamic loading finished: {} clicks, height changed: {}",
        outcome.clicks,
        outcome.height_changed
    );
    outcome
}

/// Closes a cookie consent banner, preferring "reject" style buttons.
///
/// Returns whether a banner control was clicked.
pub async fn dismiss_cookie_banners<D: PageDriver>(driver: &mut D) -> bool {
    if !driver.capabilities().interaction {
        return false;
    }

    let candidates = match captioned_elements(driver, COOKIE_CONTROL_SELECTOR).await {
        Ok(candidates) => candidates,
        Err(e) => {
            ::log::debug!("Cookie banner search failed: {}", e);
            return false;
        }
    };

    for pattern in COOKIE_PATTERNS.iter() {
        for (element, text) in &candidates {
            if !pattern.is_match(text) || !driver.is_visible(element).await.unwrap_or(false) {
                continue;
            }
            match driver.click(element, ClickMode::Normal).await {
                Ok(()) => {
                    tokio::time::sleep(COOKIE_SETTLE).await;
                    ::log::info!("Closed cookie banner: '{}'", truncate_chars(text, 30));
                    return true;
                }
                Err(e) => ::log::debug!("Cookie banner click failed: {}", e),
            }
        }
    }
    false
}

/// Removes overlays that intercept clicks; failures are logged only
pub async fn dismiss_overlays<D: PageDriver>(driver: &mut D) {
    if !driver.capabilities().scripting {
        return;
    }
    match driver.evaluate(DISMISS_OVERLAYS_SCRIPT).await {
        Ok(removed) => ::log::debug!("Dismissed overlays (removed: {})", removed),
        Err(e) => ::log::warn!("Overlay dismissal failed: {}", e),
    }
}

async fn document_height<D: PageDriver>(driver: &mut D) -> u64 {
    match driver.evaluate(HEIGHT_SCRIPT).await {
        Ok(value) => value
            .as_u64()
            .or_else(|| value.as_f64().map(|h| h.max(0.0) as u64))
            .unwrap_or(0),
        Err(e) => {
            ::log::debug!("Height measurement failed: {}", e);
            0
        }
    }
}

/// Elements matching `selector` with their non-empty visible captions
async fn captioned_elements<D: PageDriver>(
    driver: &mut D,
    selector: &str,
) -> Result<Vec<(D::Element, String)>, DriverError> {
    let elements = driver.query_all(selector).await?;
    let mut captioned = Vec::with_capacity(elements.len());
    for element in elements {
        match driver.text(&element).await {
            Ok(text) if !text.trim().is_empty() => captioned.push((element, text.trim().to_string())),
            Ok(_) => {}
            Err(e) => ::log::debug!("Could not read control text: {}", e),
        }
    }
    Ok(captioned)
}

async fn is_clickable<D: PageDriver>(driver: &mut D, element: &D::Element) -> bool {
    driver.is_visible(element).await.unwrap_or(false) && driver.is_enabled(element).await.unwrap_or(false)
}

async fn click_phrase_control<D: PageDriver>(driver: &mut D, config: &LoaderConfig) -> bool {
    let candidates = match captioned_elements(driver, BUTTON_SELECTOR).await {
        Ok(candidates) => candidates,
        Err(e) => {
            ::log::debug!("Button search failed: {}", e);
            return false;
        }
    };

    for pattern in LOAD_MORE_PATTERNS.iter() {
        for (element, text) in &candidates {
            if !pattern.is_match(text) || !is_clickable(driver, element).await {
                continue;
            }
            if click_with_recovery(driver, element, config).await {
                ::log::debug!("Clicked button '{}'", truncate_chars(text, 30));
                return true;
            }
        }
    }
    false
}

async fn click_selector_control<D: PageDriver>(driver: &mut D, config: &LoaderConfig) -> bool {
    for selector in LOAD_MORE_SELECTORS {
        let element = match driver.query_one(selector).await {
            Ok(Some(element)) => element,
            Ok(None) => continue,
            Err(e) => {
                ::log::debug!("Selector search failed ({}): {}", selector, e);
                continue;
            }
        };
        if !is_clickable(driver, &element).await {
            continue;
        }
        if click_with_recovery(driver, &element, config).await {
            ::log::debug!("Clicked control matching {}", selector);
            return true;
        }
    }
    false
}

/// Clicks `element`; when something covers it, clears overlays and retries
/// once normally and once forced. Returns whether any click landed.
async fn click_with_recovery<D: PageDriver>(
    driver: &mut D,
    element: &D::Element,
    config: &LoaderConfig,
) -> bool {
    let error = match timed_click(driver, element, ClickMode::Normal, config.click_timeout()).await {
        Ok(()) => return true,
        Err(e) => e,
    };
    if !error.is_click_blocked() {
        ::log::debug!("Click failed: {}", error);
        return false;
    }

    ::log::debug!("Click blocked ({}), dismissing overlays", error);
    dismiss_overlays(driver).await;
    if timed_click(driver, element, ClickMode::Normal, config.click_timeout())
        .await
        .is_ok()
    {
        return true;
    }
    match timed_click(driver, element, ClickMode::Forced, config.click_timeout()).await {
        Ok(()) => true,
        Err(e) => {
            ::log::warn!("Forced click failed as well: {}", e);
            false
        }
    }
}

async fn timed_click<D: PageDriver>(
    driver: &mut D,
    element: &D::Element,
    mode: ClickMode,
    timeout: Duration,
) -> Result<(), DriverError> {
    tokio::time::timeout(timeout, driver.click(element, mode))
        .await
        .map_err(|_| DriverError::Timeout(format!("click took longer than {} ms", timeout.as_millis())))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDriver;

    fn config() -> LoaderConfig {
        LoaderConfig {
            max_iterations: 10,
            settle_ms: 0,
            stable_iterations: 3,
            click_timeout_ms: 1000,
        }
    }

    const URL: &str = "https://x.test/reviews";

    fn reviews(count: usize, button: &str) -> String {
        let items: String = (0..count).map(|i| format!("<li>Review {i}</li>")).collect();
        format!("<html><body><ul>{items}</ul>{button}</body></html>")
    }

    #[tokio::test]
    async fn test_clicks_until_button_disappears() {
        let button = "<button>Show more</button>";
        let mut driver = FakeDriver::new().with_page(
            URL,
            vec![reviews(2, button), reviews(4, button), reviews(6, "")],
        );
        driver.open(URL);

        let outcome = load_dynamic_content(&mut driver, &config()).await;
        assert_eq!(outcome.clicks, 2);
        assert!(outcome.height_changed);
        assert!(driver.source_now().contains("Review 5"));
        // Two clicks, then three quiet iterations of scrolling
        assert_eq!(driver.scrolls, 3);
    }

    #[tokio::test]
    async fn test_japanese_caption_and_selector_heuristics() {
        let mut driver = FakeDriver::new().with_page(
            URL,
            vec![
                reviews(1, "<button>もっと見る</button>"),
                reviews(2, r#"<a class="load-more-link" href="/next">More</a>"#),
                reviews(3, ""),
            ],
        );
        driver.open(URL);

        let outcome = load_dynamic_content(&mut driver, &config()).await;
        assert_eq!(outcome.clicks, 2);
    }

    #[tokio::test]
    async fn test_disabled_button_is_not_clicked() {
        let mut driver = FakeDriver::new().with_page(
            URL,
            vec![reviews(1, "<button disabled>Load more</button>"), reviews(2, "")],
        );
        driver.open(URL);

        let outcome = load_dynamic_content(&mut driver, &config()).await;
        assert_eq!(outcome.clicks, 0);
        assert!(!outcome.made_progress());
        assert_eq!(driver.scrolls, 3);
    }

    #[tokio::test]
    async fn test_intercepted_click_dismisses_overlays_and_retries() {
        let button = "<button>Load more</button>";
        let mut driver = FakeDriver::new()
            .with_page(URL, vec![reviews(1, button), reviews(2, "")])
            .with_blocked_clicks(1);
        driver.open(URL);

        let outcome = load_dynamic_content(&mut driver, &config()).await;
        assert_eq!(outcome.clicks, 1);
        assert_eq!(driver.overlay_dismissals, 1);
    }

    #[tokio::test]
    async fn test_forced_click_after_two_blocked_clicks() {
        let button = "<button>Load more</button>";
        let mut driver = FakeDriver::new()
            .with_page(URL, vec![reviews(1, button), reviews(2, "")])
            .with_blocked_clicks(2);
        driver.open(URL);

        let outcome = load_dynamic_content(&mut driver, &config()).await;
        assert_eq!(outcome.clicks, 1);
        assert_eq!(driver.forced_clicks, 1);
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let button = "<button>Load more</button>";
        let snapshots = (1..=10).map(|n| reviews(n, button)).collect();
        let mut driver = FakeDriver::new().with_page(URL, snapshots);
        driver.open(URL);

        let config = LoaderConfig {
            max_iterations: 4,
            ..config()
        };
        let outcome = load_dynamic_content(&mut driver, &config).await;
        assert_eq!(outcome.clicks, 4);
    }

    #[tokio::test]
    async fn test_inert_without_interaction() {
        let mut driver = FakeDriver::new()
            .with_page(URL, vec![reviews(1, "<button>Load more</button>"), reviews(2, "")])
            .static_only();
        driver.open(URL);

        let outcome = load_dynamic_content(&mut driver, &config()).await;
        assert_eq!(outcome, LoadOutcome::default());
        assert_eq!(driver.scrolls, 0);
    }

    #[tokio::test]
    async fn test_cookie_banner_prefers_reject() {
        let page = r#"<html><body>
            <div class="cookie"><button>Accept all</button><button>Reject all</button></div>
            <p>Article</p></body></html>"#;
        let mut driver = FakeDriver::new().with_page(URL, vec![page.to_string(), reviews(1, "")]);
        driver.open(URL);

        assert!(dismiss_cookie_banners(&mut driver).await);
        assert_eq!(driver.clicked_texts, vec!["Reject all"]);
    }

    #[tokio::test]
    async fn test_no_cookie_banner() {
        let mut driver = FakeDriver::new().with_page(URL, vec![reviews(1, "")]);
        driver.open(URL);
        assert!(!dismiss_cookie_banners(&mut driver).await);
    }

    #[tokio::test]
    async fn test_ordinary_links_are_not_cookie_controls() {
        let page = r#"<html><body><p>Article</p><footer>
            <a href="/privacy">Cookie policy</a><a href="/fb">Facebook</a>
            <a href="/book">Book now</a><button>Close-up gallery</button>
            </footer></body></html>"#;
        let mut driver = FakeDriver::new().with_page(URL, vec![page.to_string()]);
        driver.open(URL);

        assert!(!dismiss_cookie_banners(&mut driver).await);
        assert!(driver.clicked_texts.is_empty());
    }

    #[tokio::test]
    async fn test_short_caption_matches_whole_word_only() {
        let page = r#"<html><body><a href="/book">Book now</a>
            <div class="consent">We use cookies <button> OK </button></div></body></html>"#;
        let mut driver = FakeDriver::new().with_page(URL, vec![page.to_string(), reviews(1, "")]);
        driver.open(URL);

        assert!(dismiss_cookie_banners(&mut driver).await);
        assert_eq!(driver.clicked_texts, vec!["OK"]);
    }

    #[test]
    fn test_phrases_compile() {
        assert_eq!(LOAD_MORE_PATTERNS.len(), LOAD_MORE_PHRASES.len());
        assert_eq!(COOKIE_PATTERNS.len(), COOKIE_PHRASES.len());
        assert!(LOAD_MORE_PATTERNS.iter().any(|p| p.is_match("SHOW   MORE")));
    }
}
