use super::{Capabilities, ClickMode, PageDriver, WaitCondition};
use crate::error::DriverError;
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::Instant;

/// WebDriver endpoints tried when the configured one does not answer
const FALLBACK_WEBDRIVER_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4723", // Appium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444",
];

const READY_STATE_POLL: Duration = Duration::from_millis(100);

/// Browser session settings
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub window_width: u32,
    pub window_height: u32,
    pub accept_language: String,
}

/// Backend driving a real browser through a WebDriver server.
pub struct BrowserDriver {
    client: Client,
}

impl BrowserDriver {
    /// Opens a browser session, trying well-known WebDriver ports when the
    /// configured endpoint is unreachable
    pub async fn connect(options: &BrowserOptions) -> Result<Self, DriverError> {
        let capabilities = session_capabilities(options);

        match open_session(&options.webdriver_url, &capabilities).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", options.webdriver_url);
                return Self::prepare(client, options).await;
            }
            Err(e) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    options.webdriver_url,
                    e
                );
            }
        }

        for url in FALLBACK_WEBDRIVER_URLS {
            if url == options.webdriver_url {
                continue;
            }
            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = open_session(url, &capabilities).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Self::prepare(client, options).await;
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(DriverError::Command(format!(
            "no WebDriver server reachable at {} or the fallback ports",
            options.webdriver_url
        )))
    }

    async fn prepare(client: Client, options: &BrowserOptions) -> Result<Self, DriverError> {
        if let Err(e) = client
            .set_window_size(options.window_width, options.window_height)
            .await
        {
            ::log::warn!("Could not resize browser window: {}", e);
        }
        Ok(Self { client })
    }

    async fn ready_state(&self) -> Result<String, DriverError> {
        let state = self
            .client
            .execute("return document.readyState;", vec![])
            .await
            .map_err(command_error)?;
        Ok(state.as_str().unwrap_or_default().to_string())
    }

    async fn wait_for(&self, wait: WaitCondition, deadline: Instant) -> Result<(), DriverError> {
        loop {
            let state = self.ready_state().await?;
            let ready = match wait {
                WaitCondition::DomContentLoaded => state == "interactive" || state == "complete",
                WaitCondition::Load => state == "complete",
            };
            if ready {
                return Ok(());
            }
            if Instant::now() + READY_STATE_POLL > deadline {
                return Err(DriverError::Timeout(format!(
                    "document still '{}' when the navigation deadline passed",
                    state
                )));
            }
            tokio::time::sleep(READY_STATE_POLL).await;
        }
    }
}

async fn open_session(
    webdriver_url: &str,
    capabilities: &serde_json::Map<String, Value>,
) -> Result<Client, String> {
    let mut builder = ClientBuilder::native();
    builder.capabilities(capabilities.clone());
    builder
        .connect(webdriver_url)
        .await
        .map_err(|e| e.to_string())
}

/// W3C capabilities for a Chrome session; `eager` returns from navigation at
/// DOMContentLoaded so the slower conditions are polled by the driver
fn session_capabilities(options: &BrowserOptions) -> serde_json::Map<String, Value> {
    let mut args = vec![
        format!("--window-size={},{}", options.window_width, options.window_height),
        format!("--user-agent={}", options.user_agent),
        format!("--lang={}", options.accept_language),
        "--disable-blink-features=AutomationControlled".to_string(),
    ];
    if options.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
        args.push("--no-sandbox".to_string());
    }

    let mut capabilities = serde_json::Map::new();
    capabilities.insert("pageLoadStrategy".to_string(), json!("eager"));
    capabilities.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": args,
            "prefs": {"intl.accept_languages": options.accept_language}
        }),
    );
    capabilities
}

fn command_error(error: CmdError) -> DriverError {
    let message = error.to_string();
    let lower = message.to_lowercase();
    if lower.contains("intercepted") || lower.contains("not clickable") {
        DriverError::ClickIntercepted(message)
    } else if lower.contains("timeout") || lower.contains("timed out") {
        DriverError::Timeout(message)
    } else if lower.contains("invalid selector") {
        DriverError::InvalidSelector(message)
    } else {
        DriverError::Command(message)
    }
}

fn element_arg(element: &Element) -> Result<Value, DriverError> {
    serde_json::to_value(element).map_err(|e| DriverError::Command(e.to_string()))
}

#[async_trait]
impl PageDriver for BrowserDriver {
    type Element = Element;

    fn capabilities(&self) -> Capabilities {
        Capabilities::BROWSER
    }

    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitCondition,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        let navigation = async {
            self.client.goto(url).await.map_err(command_error)?;
            self.wait_for(wait, deadline).await
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(DriverError::Navigation {
                url: url.to_string(),
                reason: format!("not loaded within {} seconds", timeout.as_secs()),
            }),
        }
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        let url = self.client.current_url().await.map_err(command_error)?;
        Ok(url.to_string())
    }

    async fn title(&mut self) -> Result<String, DriverError> {
        self.client.title().await.map_err(command_error)
    }

    async fn source(&mut self) -> Result<String, DriverError> {
        self.client.source().await.map_err(command_error)
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<Element>, DriverError> {
        self.client
            .find_all(Locator::Css(selector))
            .await
            .map_err(command_error)
    }

    async fn text(&mut self, element: &Element) -> Result<String, DriverError> {
        element.text().await.map_err(command_error)
    }

    async fn attribute(
        &mut self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        element.attr(name).await.map_err(command_error)
    }

    async fn is_visible(&mut self, element: &Element) -> Result<bool, DriverError> {
        element.is_displayed().await.map_err(command_error)
    }

    async fn is_enabled(&mut self, element: &Element) -> Result<bool, DriverError> {
        element.is_enabled().await.map_err(command_error)
    }

    async fn click(&mut self, element: &Element, mode: ClickMode) -> Result<(), DriverError> {
        let target = element_arg(element)?;
        match mode {
            ClickMode::Normal => {
                self.client
                    .execute(
                        "arguments[0].scrollIntoView({block: 'center'});",
                        vec![target],
                    )
                    .await
                    .map_err(command_error)?;
                element.click().await.map_err(command_error)
            }
            ClickMode::Forced => {
                self.client
                    .execute("arguments[0].click();", vec![target])
                    .await
                    .map_err(command_error)?;
                Ok(())
            }
        }
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, DriverError> {
        self.client
            .execute(script, vec![])
            .await
            .map_err(command_error)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        self.evaluate("window.scrollTo(0, document.body.scrollHeight);")
            .await
            .map(|_| ())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.client.screenshot().await.map_err(command_error)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.client.clone().close().await.map_err(command_error)
    }
}
