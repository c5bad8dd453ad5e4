//! Strategy oracle: an external language model that reads a page summary and
//! answers with an extraction strategy in free text.
//!
//! Adapters never retry; the crawl loop decides what a failure means.

pub mod cli;
pub mod http;

use crate::error::OracleError;
use crate::summary::PageSummary;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

pub use cli::CliOracle;
pub use http::HttpOracle;

/// Bumped whenever the prompt or the requested schema changes
pub const PROMPT_VERSION: u32 = 1;

/// Instructions and target schema sent with every summary.
///
/// Placeholders: `{url}`, `{title}`, `{dom_stats}`, `{sample_html}`,
/// `{visible_text}`.
pub const PROMPT_TEMPLATE: &str = r##"You are a web scraping expert. Analyse the structure of the web page below and return the best scraping strategy as JSON. Output JSON only, without explanations.

[Page]
URL: {url}
Title: {title}

[DOM statistics]
{dom_stats}

[HTML sample (first 4000 characters)]
{sample_html}

[Visible text sample (first 500 characters)]
{visible_text}

[Instructions]
Return a JSON object with:
1. page_type: one of blog_listing, article, product_page, forum_thread, news, portfolio, generic
2. content_selectors: CSS selectors of the main content
   - main_container: element wrapping the main content (e.g. "article.post", "main", "#content")
   - title: title element (e.g. "h1.entry-title")
   - body: body text element (e.g. ".entry-content")
   - author: author element, if any
   - date: date element, if any
   - items: on listing pages, the selector of each repeated item (e.g. ".post-item", "article")
3. pagination:
   - next_selector: CSS selector of the link to the next page, or null
4. ignore_selectors: array of CSS selectors to ignore (navigation, ads, sidebars, ...)
5. extraction_fields: array of fields to extract
   - name: field name
   - selector: CSS selector
   - attribute: attribute to read (omit to read the text)

[Output format]
{
  "page_type": "blog_listing",
  "content_selectors": {
    "main_container": "main",
    "title": "h1",
    "body": ".content",
    "author": ".author",
    "date": "time",
    "items": "article"
  },
  "pagination": {
    "next_selector": "a.next"
  },
  "ignore_selectors": ["nav", "footer", ".sidebar", ".ad"],
  "extraction_fields": [
    {"name": "title", "selector": "h1"},
    {"name": "content", "selector": ".content"},
    {"name": "date", "selector": "time", "attribute": "datetime"}
  ]
}"##;

/// Interval between "still waiting" log lines during an oracle call
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// An image sent along with the prompt
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub media_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            media_type: "image/png".to_string(),
            data,
        }
    }

    /// `data:` URI of the image
    pub fn data_uri(&self) -> String {
        use base64::Engine;
        format!(
            "data:{};base64,{}",
            self.media_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// External model proposing extraction strategies
#[async_trait]
pub trait StrategyOracle: Send + Sync {
    /// Sends the prompt (and optional image) and returns the raw answer
    async fn ask(&self, prompt: &str, image: Option<&InlineImage>) -> Result<String, OracleError>;
}

#[async_trait]
impl<T: StrategyOracle + ?Sized> StrategyOracle for Box<T> {
    async fn ask(&self, prompt: &str, image: Option<&InlineImage>) -> Result<String, OracleError> {
        (**self).ask(prompt, image).await
    }
}

/// Fills the prompt template with a page summary
pub fn build_prompt(summary: &PageSummary) -> String {
    let dom_stats = serde_json::to_string_pretty(&summary.dom_stats).unwrap_or_default();
    PROMPT_TEMPLATE
        .replace("{url}", &summary.url)
        .replace("{title}", &summary.title)
        .replace("{dom_stats}", &dom_stats)
        .replace("{sample_html}", &summary.sample_html)
        .replace("{visible_text}", &summary.visible_text_sample)
}

/// Rejects blank answers so every adapter reports them the same way
pub(crate) fn non_empty_response(text: String) -> Result<String, OracleError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(OracleError::Empty)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Awaits `call`, logging a heartbeat while it runs
pub(crate) async fn with_heartbeat<F, T>(call: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let started = Instant::now();
    let mut ticker = tokio::time::interval_at(started + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(call);
    loop {
        tokio::select! {
            result = &mut call => return result,
            _ = ticker.tick() => {
                ::log::info!("Waiting for strategy oracle... ({}s elapsed)", started.elapsed().as_secs());
            }
        }
    }
}
