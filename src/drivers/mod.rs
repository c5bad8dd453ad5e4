//! Page access backends.
//!
//! A [`PageDriver`] owns one page exclusively. The browser backend drives a
//! real browser over WebDriver; the static backend fetches markup over HTTP
//! and can only query it.

pub mod browser;
pub mod static_fetch;

use crate::error::DriverError;
use async_trait::async_trait;
use std::time::Duration;

pub use browser::BrowserDriver;
pub use static_fetch::{StaticDriver, StaticElement};

/// When navigation counts as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitCondition {
    /// DOM parsed, subresources may still be loading
    #[default]
    DomContentLoaded,
    /// Full load event fired
    Load,
}

/// How a click is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMode {
    /// A user-like click that fails if another element receives it
    Normal,
    /// Dispatch the click on the element directly, ignoring what covers it
    Forced,
}

/// What a backend is able to do beyond querying markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub scripting: bool,
    pub interaction: bool,
    pub screenshots: bool,
}

impl Capabilities {
    pub const STATIC: Capabilities = Capabilities {
        scripting: false,
        interaction: false,
        screenshots: false,
    };

    pub const BROWSER: Capabilities = Capabilities {
        scripting: true,
        interaction: true,
        screenshots: true,
    };
}

/// Access to one page's DOM.
///
/// Element handles are backend specific and only valid until the next
/// navigation.
#[async_trait]
pub trait PageDriver: Send {
    type Element: Send + Sync;

    fn capabilities(&self) -> Capabilities;

    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitCondition,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    async fn current_url(&mut self) -> Result<String, DriverError>;

    async fn title(&mut self) -> Result<String, DriverError>;

    /// Serialized current DOM
    async fn source(&mut self) -> Result<String, DriverError>;

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Self::Element>, DriverError>;

    async fn query_one(&mut self, selector: &str) -> Result<Option<Self::Element>, DriverError> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn text(&mut self, element: &Self::Element) -> Result<String, DriverError>;

    async fn attribute(
        &mut self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    async fn is_visible(&mut self, element: &Self::Element) -> Result<bool, DriverError>;

    async fn is_enabled(&mut self, element: &Self::Element) -> Result<bool, DriverError>;

    async fn click(&mut self, element: &Self::Element, mode: ClickMode) -> Result<(), DriverError>;

    /// Runs a script body (using `return`) against the page
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, DriverError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError>;

    /// PNG screenshot of the viewport
    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;

    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}
