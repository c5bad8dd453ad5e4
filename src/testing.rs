//! In-memory fakes for the page driver and the strategy oracle.

use crate::drivers::static_fetch::{document_title, snapshot_elements};
use crate::drivers::{Capabilities, ClickMode, PageDriver, StaticElement, WaitCondition};
use crate::error::{DriverError, OracleError};
use crate::oracle::{InlineImage, StrategyOracle};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn canonical(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[derive(Debug, Default)]
struct FakePage {
    snapshots: Vec<String>,
    index: usize,
}

/// Page driver serving scripted HTML snapshots per URL.
///
/// Every successful click moves the current page to its next snapshot (the
/// last one sticks). Document height is the length of the current markup.
#[derive(Debug)]
pub struct FakeDriver {
    pages: HashMap<String, FakePage>,
    current: String,
    capabilities: Capabilities,
    failing: HashSet<String>,
    hidden: Vec<String>,
    blocked_clicks: usize,
    pub navigations: Vec<String>,
    pub clicked_texts: Vec<String>,
    pub forced_clicks: usize,
    pub scrolls: usize,
    pub overlay_dismissals: usize,
    pub closed: bool,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            current: String::new(),
            capabilities: Capabilities::BROWSER,
            failing: HashSet::new(),
            hidden: Vec::new(),
            blocked_clicks: 0,
            navigations: Vec::new(),
            clicked_texts: Vec::new(),
            forced_clicks: 0,
            scrolls: 0,
            overlay_dismissals: 0,
            closed: false,
        }
    }

    pub fn with_page(mut self, url: &str, snapshots: Vec<String>) -> Self {
        self.pages.insert(canonical(url), FakePage { snapshots, index: 0 });
        self
    }

    /// Navigation to `url` reports an error; its markup (if any) still loads
    pub fn with_failing_navigation(mut self, url: &str) -> Self {
        self.failing.insert(canonical(url));
        self
    }

    /// Elements matching `selector` report as invisible
    pub fn with_hidden(mut self, selector: &str) -> Self {
        self.hidden.push(selector.to_string());
        self
    }

    /// The next `count` normal clicks are intercepted by an overlay
    pub fn with_blocked_clicks(mut self, count: usize) -> Self {
        self.blocked_clicks = count;
        self
    }

    /// Behave like the static backend
    pub fn static_only(mut self) -> Self {
        self.capabilities = Capabilities::STATIC;
        self
    }

    /// Points the driver at `url` without recording a navigation
    pub fn open(&mut self, url: &str) {
        self.current = canonical(url);
    }

    pub fn source_now(&self) -> String {
        self.pages
            .get(&self.current)
            .and_then(|page| page.snapshots.get(page.index))
            .cloned()
            .unwrap_or_default()
    }

    fn advance(&mut self) {
        if let Some(page) = self.pages.get_mut(&self.current) {
            if page.index + 1 < page.snapshots.len() {
                page.index += 1;
            }
        }
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    type Element = StaticElement;

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn navigate(
        &mut self,
        url: &str,
        _wait: WaitCondition,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        self.navigations.push(url.to_string());
        self.current = canonical(url);
        if self.failing.contains(&self.current) || !self.pages.contains_key(&self.current) {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.current.clone())
    }

    async fn title(&mut self) -> Result<String, DriverError> {
        Ok(document_title(&self.source_now()))
    }

    async fn source(&mut self) -> Result<String, DriverError> {
        Ok(self.source_now())
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<StaticElement>, DriverError> {
        snapshot_elements(&self.source_now(), selector)
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

    async fn is_visible(&mut self, element: &StaticElement) -> Result<bool, DriverError> {
        let html = self.source_now();
        for selector in &self.hidden {
            if snapshot_elements(&html, selector)?.contains(element) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn is_enabled(&mut self, element: &StaticElement) -> Result<bool, DriverError> {
        Ok(!element.attributes.contains_key("disabled"))
    }

    async fn click(&mut self, element: &StaticElement, mode: ClickMode) -> Result<(), DriverError> {
        if !self.capabilities.interaction {
            return Err(DriverError::Unsupported("clicking"));
        }
        if mode == ClickMode::Normal && self.blocked_clicks > 0 {
            self.blocked_clicks -= 1;
            return Err(DriverError::ClickIntercepted("<div class=\"overlay\">".to_string()));
        }
        if mode == ClickMode::Forced {
            self.forced_clicks += 1;
        }
        self.clicked_texts.push(element.text.clone());
        self.advance();
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, DriverError> {
        if !self.capabilities.scripting {
            return Err(DriverError::Unsupported("script evaluation"));
        }
        if script.contains("scrollHeight") {
            return Ok(json!(self.source_now().len()));
        }
        if script.contains("#layers") {
            self.overlay_dismissals += 1;
            return Ok(json!(0));
        }
        Ok(Value::Null)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        if !self.capabilities.interaction {
            return Err(DriverError::Unsupported("scrolling"));
        }
        self.scrolls += 1;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        if !self.capabilities.screenshots {
            return Err(DriverError::Unsupported("screenshots"));
        }
        Ok(b"\x89PNG".to_vec())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.closed = true;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct OracleScript {
    responses: VecDeque<Result<String, OracleError>>,
    delays: VecDeque<Duration>,
    prompts: Vec<String>,
    images: usize,
}

/// Oracle answering from a queue; an exhausted queue answers `Empty`.
///
/// Clones share the queue and the call log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    script: Arc<Mutex<OracleScript>>,
}

impl ScriptedOracle {
    pub fn new(responses: Vec<Result<String, OracleError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(OracleScript {
                responses: responses.into(),
                ..OracleScript::default()
            })),
        }
    }

    /// Oracle that answers every call with `strategy_json`, `times` times
    pub fn repeating(strategy_json: &str, times: usize) -> Self {
        Self::new((0..times).map(|_| Ok(strategy_json.to_string())).collect())
    }

    /// Delays the n-th answer by the n-th duration
    pub fn with_delays(self, delays: Vec<Duration>) -> Self {
        self.script.lock().unwrap().delays = delays.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.script.lock().unwrap().prompts.len()
    }

    pub fn images(&self) -> usize {
        self.script.lock().unwrap().images
    }

    pub fn prompts(&self) -> Vec<String> {
        self.script.lock().unwrap().prompts.clone()
    }
}

#[async_trait]
impl StrategyOracle for ScriptedOracle {
    async fn ask(&self, prompt: &str, image: Option<&InlineImage>) -> Result<String, OracleError> {
        let (response, delay) = {
            let mut script = self.script.lock().unwrap();
            script.prompts.push(prompt.to_string());
            if image.is_some() {
                script.images += 1;
            }
            let response = script.responses.pop_front().unwrap_or(Err(OracleError::Empty));
            (response, script.delays.pop_front().unwrap_or_default())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response
    }
}
