pub mod config;
pub mod crawl;
pub mod decoder;
pub mod drivers;
pub mod error;
pub mod extract;
pub mod filter;
pub mod loader;
pub mod oracle;
pub mod pagination;
pub mod results;
pub mod strategy;
pub mod summary;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types for convenience
pub use config::{Backend, ScrapeConfig};
pub use crawl::{CrawlState, Orchestrator};
pub use error::CrawlError;
pub use results::{CrawlResult, PageResult};
pub use strategy::Strategy;

use config::OracleTransport;
use drivers::browser::BrowserOptions;
use drivers::{BrowserDriver, PageDriver, StaticDriver};
use oracle::{CliOracle, HttpOracle, StrategyOracle};

/// Main builder for a strategy-guided scrape of one start URL
pub struct Scraper {
    url: String,
    config: ScrapeConfig,
}

impl Scraper {
    /// Create a new Scraper with default settings and environment overrides
    pub fn new(url: &str) -> Self {
        let mut config = ScrapeConfig::default();
        config.apply_env();
        Self {
            url: url.to_string(),
            config,
        }
    }

    /// Use `config` as is
    pub fn with_config(mut self, config: ScrapeConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a file, then apply environment overrides
    pub fn with_config_file(
        self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = ScrapeConfig::from_file(path)?;
        config.apply_env();
        Ok(self.with_config(config))
    }

    /// Load configuration from a string, then apply environment overrides
    pub fn with_config_str(self, config_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config: ScrapeConfig = serde_json::from_str(config_str)?;
        config.apply_env();
        Ok(self.with_config(config))
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Set the total time budget in seconds
    pub fn with_time_limit(mut self, seconds: u64) -> Self {
        self.config.time_limit_secs = seconds;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    pub fn with_webdriver_url(mut self, webdriver_url: &str) -> Self {
        self.config.webdriver_url = webdriver_url.to_string();
        self
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Opens the configured backend and crawls from the start URL
    pub async fn run(self) -> Result<CrawlResult, CrawlError> {
        let oracle = build_oracle(&self.config);
        match self.config.backend {
            Backend::Browser => {
                let options = BrowserOptions {
                    webdriver_url: self.config.webdriver_url.clone(),
                    headless: self.config.headless,
                    user_agent: self.config.user_agent.clone(),
                    window_width: self.config.window.width,
                    window_height: self.config.window.height,
                    accept_language: self.config.accept_language.clone(),
                };
                let driver = BrowserDriver::connect(&options).await?;
                crawl(driver, oracle, self.config, &self.url).await
            }
            Backend::Static => {
                let driver = StaticDriver::new(&self.config.user_agent, &self.config.accept_language)?;
                crawl(driver, oracle, self.config, &self.url).await
            }
        }
    }
}

fn build_oracle(config: &ScrapeConfig) -> Box<dyn StrategyOracle> {
    let timeout = config.oracle.timeout();
    match &config.oracle.transport {
        OracleTransport::Cli {
            command,
            args,
            prompt_flag,
        } => Box::new(
            CliOracle::new(command.clone(), timeout)
                .with_args(args.clone())
                .with_prompt_flag(prompt_flag.clone()),
        ),
        OracleTransport::Http {
            endpoint,
            model,
            api_key_env,
            max_tokens,
        } => Box::new(
            HttpOracle::new(endpoint.clone(), model.clone(), timeout)
                .with_api_key(std::env::var(api_key_env).ok())
                .with_max_tokens(*max_tokens),
        ),
    }
}

/// Runs the crawl loop and always releases the driver afterwards
async fn crawl<D: PageDriver, O: StrategyOracle>(
    driver: D,
    oracle: O,
    config: ScrapeConfig,
    url: &str,
) -> Result<CrawlResult, CrawlError> {
    let mut orchestrator = Orchestrator::new(driver, oracle, config);
    let result = orchestrator.run(url).await;
    if let Err(e) = orchestrator.driver_mut().close().await {
        ::log::warn!("Failed to close page driver: {}", e);
    }
    result
}
