use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Page access backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Real browser over WebDriver
    #[default]
    Browser,
    /// Plain HTTP fetch, no scripts
    Static,
}

/// Browser viewport size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Settings of the dynamic content loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Upper bound on load iterations per round
    #[serde(default = "default_loader_iterations")]
    pub max_iterations: usize,

    /// Pause after each click or scroll, in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Iterations without click or height change before giving up
    #[serde(default = "default_stable_iterations")]
    pub stable_iterations: usize,

    /// Upper bound on a single click, in milliseconds
    #[serde(default = "default_click_timeout_ms")]
    pub click_timeout_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_loader_iterations(),
            settle_ms: default_settle_ms(),
            stable_iterations: default_stable_iterations(),
            click_timeout_ms: default_click_timeout_ms(),
        }
    }
}

impl LoaderConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn click_timeout(&self) -> Duration {
        Duration::from_millis(self.click_timeout_ms)
    }
}

/// Where strategy requests are sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OracleTransport {
    /// A command-line model client, prompt passed as an argument
    Cli {
        #[serde(default)]
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_prompt_flag")]
        prompt_flag: String,
    },
    /// An OpenAI-compatible chat-completions endpoint
    Http {
        endpoint: String,
        model: String,
        /// Environment variable holding the bearer token
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_max_tokens")]
        max_tokens: u32,
    },
}

impl Default for OracleTransport {
    fn default() -> Self {
        OracleTransport::Cli {
            command: String::new(),
            args: Vec::new(),
            prompt_flag: default_prompt_flag(),
        }
    }
}

/// Strategy oracle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(flatten)]
    pub transport: OracleTransport,

    /// Upper bound on one oracle call, in seconds
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            transport: OracleTransport::default(),
            timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration for one scrape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default)]
    pub backend: Backend,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub window: WindowSize,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Wall-clock budget of the whole crawl, in seconds
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: u64,

    /// Time kept in reserve for writing results, in seconds
    #[serde(default = "default_safety_margin_secs")]
    pub safety_margin_secs: u64,

    /// Minimum remaining time for a strategy refinement, in seconds
    #[serde(default = "default_refine_margin_secs")]
    pub refine_margin_secs: u64,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Upper bound on load/extract rounds per page
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    #[serde(default)]
    pub loader: LoaderConfig,

    /// Re-consult the oracle between rounds that keep growing
    #[serde(default = "default_true")]
    pub refine_strategy: bool,

    /// Send a screenshot with each strategy request when the backend can take one
    #[serde(default)]
    pub attach_screenshot: bool,

    #[serde(default)]
    pub oracle: OracleConfig,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            webdriver_url: default_webdriver_url(),
            headless: true,
            user_agent: default_user_agent(),
            window: WindowSize::default(),
            accept_language: default_accept_language(),
            time_limit_secs: default_time_limit_secs(),
            safety_margin_secs: default_safety_margin_secs(),
            refine_margin_secs: default_refine_margin_secs(),
            max_pages: default_max_pages(),
            max_rounds: default_max_rounds(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            loader: LoaderConfig::default(),
            refine_strategy: true,
            attach_screenshot: false,
            oracle: OracleConfig::default(),
        }
    }
}

impl ScrapeConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Applies `WEBDRIVER_URL` and `ORACLE_COMMAND` from the environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(webdriver_url) = lookup("WEBDRIVER_URL").filter(|v| !v.is_empty()) {
            self.webdriver_url = webdriver_url;
        }
        if let Some(oracle_command) = lookup("ORACLE_COMMAND").filter(|v| !v.is_empty()) {
            if let OracleTransport::Cli { command, .. } = &mut self.oracle.transport {
                *command = oracle_command;
            }
        }
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }

    pub fn safety_margin(&self) -> Duration {
        Duration::from_secs(self.safety_margin_secs)
    }

    pub fn refine_margin(&self) -> Duration {
        Duration::from_secs(self.refine_margin_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}

fn default_accept_language() -> String {
    "ja,en-US;q=0.9,en;q=0.8".to_string()
}

fn default_time_limit_secs() -> u64 {
    240
}

fn default_safety_margin_secs() -> u64 {
    30
}

fn default_refine_margin_secs() -> u64 {
    60
}

fn default_max_pages() -> usize {
    100
}

fn default_max_rounds() -> usize {
    20
}

fn default_navigation_timeout_secs() -> u64 {
    60
}

fn default_loader_iterations() -> usize {
    10
}

fn default_settle_ms() -> u64 {
    2000
}

fn default_stable_iterations() -> usize {
    3
}

fn default_click_timeout_ms() -> u64 {
    3000
}

fn default_prompt_flag() -> String {
    "-p".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_oracle_timeout_secs() -> u64 {
    300
}
