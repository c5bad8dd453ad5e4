use super::{Capabilities, ClickMode, PageDriver, WaitCondition};
use crate::error::DriverError;
use crate::extract::dom;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::time::Duration;

/// Detached copy of an element from fetched markup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticElement {
    pub tag: String,
    pub text: String,
    pub attributes: HashMap<String, String>,
}

impl StaticElement {
    fn from_element(element: scraper::ElementRef<'_>) -> Self {
        Self {
            tag: element.value().name().to_string(),
            text: dom::element_text(element),
            attributes: element
                .value()
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }
}

/// Queries `selector` against `html`, returning detached element copies
pub fn snapshot_elements(html: &str, selector: &str) -> Result<Vec<StaticElement>, DriverError> {
    let selector =
        Selector::parse(selector).map_err(|_| DriverError::InvalidSelector(selector.to_string()))?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .map(StaticElement::from_element)
        .collect())
}

/// Title of an HTML document, empty when missing
pub fn document_title(html: &str) -> String {
    let document = Html::parse_document(html);
    dom::document_title(&document)
}

/// Fetch-and-parse backend: one HTTP GET per navigation, no scripts.
pub struct StaticDriver {
    client: reqwest::Client,
    current_url: String,
    html: String,
}

impl StaticDriver {
    pub fn new(user_agent: &str, accept_language: &str) -> Result<Self, DriverError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        if let Ok(value) = HeaderValue::from_str(accept_language) {
            headers.insert(ACCEPT_LANGUAGE, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| DriverError::Command(e.to_string()))?;

        Ok(Self {
            client,
            current_url: String::new(),
            html: String::new(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<(String, String), String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        let response = response.error_for_status().map_err(|e| e.to_string())?;
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok((body, final_url))
    }
}

#[async_trait]
impl PageDriver for StaticDriver {
    type Element = StaticElement;

    fn capabilities(&self) -> Capabilities {
        Capabilities::STATIC
    }

    async fn navigate(
        &mut self,
        url: &str,
        _wait: WaitCondition,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.current_url = url.to_string();
        self.html.clear();

        let outcome = tokio::time::timeout(timeout, self.fetch(url)).await;
        match outcome {
            Ok(Ok((body, final_url))) => {
                ::log::debug!("Fetched {} ({} bytes)", final_url, body.len());
                self.html = body;
                self.current_url = final_url;
                Ok(())
            }
            Ok(Err(reason)) => Err(DriverError::Navigation {
                url: url.to_string(),
                reason,
            }),
            Err(_) => Err(DriverError::Navigation {
                url: url.to_string(),
                reason: format!("no response within {} seconds", timeout.as_secs()),
            }),
        }
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.current_url.clone())
    }

    async fn title(&mut self) -> Result<String, DriverError> {
        Ok(document_title(&self.html))
    }

    async fn source(&mut self) -> Result<String, DriverError> {
        Ok(self.html.clone())
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<StaticElement>, DriverError> {
        snapshot_elements(&self.html, selector)
    }

    async fn text(&mut self, element: &StaticElement) -> Result<String, DriverError> {
        Ok(element.text.clone())
    }

    async fn attribute(
        &mut self,
        element: &StaticElement,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(element.attributes.get(name).cloned())
    }

    async fn is_visible(&mut self, _element: &StaticElement) -> Result<bool, DriverError> {
        // No layout without a browser; fetched markup counts as visible.
        Ok(true)
    }

    async fn is_enabled(&mut self, element: &StaticElement) -> Result<bool, DriverError> {
        Ok(!element.attributes.contains_key("disabled"))
    }

    async fn click(&mut self, _element: &StaticElement, _mode: ClickMode) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("clicking"))
    }

    async fn evaluate(&mut self, _script: &str) -> Result<serde_json::Value, DriverError> {
        Err(DriverError::Unsupported("script evaluation"))
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("scrolling"))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        Err(DriverError::Unsupported("screenshots"))
    }
}
