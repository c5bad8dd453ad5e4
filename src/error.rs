//! Typed errors for the scraper.
//!
//! Only [`CrawlError`] ever reaches the caller of a crawl; the other error
//! types are absorbed inside the crawl loop wherever a failure is non-fatal.

use thiserror::Error;

/// Errors raised by a [`crate::drivers::PageDriver`] backend.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Navigation failed or did not finish in time
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A click landed on another element (overlay, sticky header, ...)
    #[error("click intercepted: {0}")]
    ClickIntercepted(String),

    /// A driver command did not complete in time
    #[error("timed out: {0}")]
    Timeout(String),

    /// The backend cannot perform this operation (e.g. scripts on a static fetch)
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),

    /// CSS selector could not be parsed
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// Any other driver-level failure
    #[error("driver command failed: {0}")]
    Command(String),
}

impl DriverError {
    /// Whether a retry after clearing overlays has a chance to succeed
    pub fn is_click_blocked(&self) -> bool {
        matches!(self, DriverError::ClickIntercepted(_) | DriverError::Timeout(_))
    }
}

/// Errors raised while asking the strategy oracle for a response.
///
/// All variants mean the same thing to the crawl loop: no strategy available.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Required settings (command, API key) are missing
    #[error("oracle is not configured: {0}")]
    NotConfigured(String),

    /// The oracle did not answer within its timeout
    #[error("oracle timed out after {0} seconds")]
    Timeout(u64),

    /// Subprocess spawn or HTTP transport failure
    #[error("oracle transport error: {0}")]
    Transport(String),

    /// Non-zero exit status or non-success HTTP status
    #[error("oracle rejected the request: {0}")]
    Rejected(String),

    /// The oracle answered with nothing
    #[error("oracle returned an empty response")]
    Empty,
}

/// Errors raised when turning free oracle text into a [`crate::strategy::Strategy`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No parseable JSON object or array in the response
    #[error("no JSON document found in oracle response: {excerpt}")]
    NoJson { excerpt: String },

    /// JSON was found but does not describe a strategy
    #[error("JSON does not describe a strategy: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Errors raised by the extraction engine.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The main-content branch produced zero records
    #[error("no content found with strategy {strategy}")]
    NoContent { strategy: String },
}

/// Crawl-level failures. These only occur on the first page, before any
/// result exists to emit.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The start URL could not be parsed
    #[error("invalid start URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The first strategy request got no usable answer
    #[error("no strategy available: {0}")]
    Oracle(#[from] OracleError),

    /// The first strategy response could not be decoded
    #[error("no strategy available: {0}")]
    Decode(#[from] DecodeError),

    /// The first extraction pass found nothing
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The driver could not be created or used at all
    #[error(transparent)]
    Driver(#[from] DriverError),
}
