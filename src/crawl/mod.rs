//! The crawl loop: strategy analysis, load/extract rounds per page, and
//! pagination under one wall-clock budget.
//!
//! Only page 1 can fail the crawl. Anything going wrong later ends the crawl
//! early with the pages collected so far.

pub mod budget;


use crate::config::ScrapeConfig;
use crate::decoder::decode_strategy;
use crate::drivers::{PageDriver, WaitCondition};
use crate::error::{CrawlError, ExtractError, OracleError};
use crate::extract::extract_page;
use crate::filter::VisitedUrls;
use crate::loader::{self, LoadOutcome};
use crate::oracle::{InlineImage, StrategyOracle, build_prompt};
use crate::pagination::find_next_page;
use crate::results::{CrawlResult, PageResult};
use crate::strategy::Strategy;
use crate::summary::summarize;
use budget::Budget;
use chrono::Utc;
use url::Url;

/// Where the crawl loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    AnalyzingStrategy,
    Loading,
    Extracting,
    Paginating,
    Done,
    Failed,
}

/// How processing of one page ended
#[derive(Debug)]
enum PageOutcome {
    /// Rounds finished; pagination continues from this URL
    Finished(Url),
    /// Nothing usable on this page; the crawl ends here
    Abandoned,
}

/// Runs one crawl over a page driver, asking `oracle` for strategies.
///
/// Holds all state of the crawl: the current strategy, visited pages and
/// accumulated results.
pub struct Orchestrator<D, O> {
    driver: D,
    oracle: O,
    config: ScrapeConfig,
    strategy: Option<Strategy>,
    visited: VisitedUrls,
    pages: Vec<PageResult>,
    state: CrawlState,
}

impl<D: PageDriver, O: StrategyOracle> Orchestrator<D, O> {
    pub fn new(driver: D, oracle: O, config: ScrapeConfig) -> Self {
        Self {
            driver,
            oracle,
            config,
            strategy: None,
            visited: VisitedUrls::new(),
            pages: Vec::new(),
            state: CrawlState::Idle,
        }
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    /// Strategy in use at the end of the last crawl
    pub fn strategy(&self) -> Option<&Strategy> {
        self.strategy.as_ref()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Crawls from `start_url` until pagination ends, the budget runs out or
    /// the page cap is reached
    pub async fn run(&mut self, start_url: &str) -> Result<CrawlResult, CrawlError> {
        let start = Url::parse(start_url).map_err(|source| CrawlError::InvalidUrl {
            url: start_url.to_string(),
            source,
        })?;

        self.strategy = None;
        self.visited = VisitedUrls::new();
        self.pages.clear();
        self.state = CrawlState::Idle;

        let budget = Budget::start(self.config.time_limit(), self.config.safety_margin());
        ::log::info!(
            "Starting crawl of {} (budget {}s, up to {} pages)",
            start,
            self.config.time_limit_secs,
            self.config.max_pages
        );

        let mut next = Some(start.clone());
        let mut page_number = 0;
        while let Some(url) = next.take() {
            if !budget.has_time() {
                ::log::info!("Time budget exhausted after {:.1}s, stopping", budget.elapsed().as_secs_f64());
                break;
            }
            if page_number >= self.config.max_pages {
                ::log::info!("Reached the page limit ({})", self.config.max_pages);
                break;
            }
            if !self.visited.insert(url.as_str()) {
                ::log::info!("Already visited {}, stopping", url);
                break;
            }
            page_number += 1;

            match self.crawl_page(&url, page_number, &budget).await {
                Ok(PageOutcome::Finished(page_url)) => {
                    self.transition(CrawlState::Paginating);
                    next = self.next_page(&page_url).await;
                }
                Ok(PageOutcome::Abandoned) => break,
                Err(e) => {
                    ::log::error!("Crawl failed on page {}: {}", page_number, e);
                    self.transition(CrawlState::Failed);
                    return Err(e);
                }
            }
        }

        self.transition(CrawlState::Done);
        let pages = std::mem::take(&mut self.pages);
        ::log::info!(
            "Crawl finished: {} pages in {:.1}s",
            pages.len(),
            budget.elapsed().as_secs_f64()
        );
        Ok(CrawlResult::from_pages(start.as_str(), pages, Utc::now()))
    }

    /// Navigates to `url` and runs load/extract rounds until the page stops
    /// growing. Errors are only returned for page 1.
    async fn crawl_page(
        &mut self,
        url: &Url,
        page_number: usize,
        budget: &Budget,
    ) -> Result<PageOutcome, CrawlError> {
        let first_page = page_number == 1;
        ::log::info!("Page {}: {}", page_number, url);

        if let Err(e) = self
            .driver
            .navigate(
                url.as_str(),
                WaitCondition::DomContentLoaded,
                self.config.navigation_timeout().min(budget.working_time()),
            )
            .await
        {
            ::log::warn!("{}; extracting from whatever loaded", e);
        }
        if first_page {
            loader::dismiss_cookie_banners(&mut self.driver).await;
            loader::dismiss_overlays(&mut self.driver).await;
        }

        let page_url = self.landed_url(url).await;
        if page_url != *url {
            self.visited.insert(page_url.as_str());
        }

        let html = self.driver.source().await.unwrap_or_default();
        if html.trim().is_empty() {
            ::log::warn!("No markup loaded for {}", page_url);
            let error = ExtractError::NoContent {
                strategy: "(page not loaded)".to_string(),
            };
            return self.abandon(first_page, error.into());
        }

        if self.strategy.is_none() {
            // The first request always happens on page 1, so failures are fatal
            let strategy = self.analyze(&page_url, &html, budget).await?;
            self.strategy = Some(strategy);
        }

        let mut best: Option<PageResult> = None;
        let mut refine = self.config.refine_strategy;
        let mut round = 0;
        while round < self.config.max_rounds {
            if !budget.has_time() {
                ::log::info!("Time budget exhausted, ending rounds on page {}", page_number);
                break;
            }
            round += 1;

            self.transition(CrawlState::Loading);
            let load = loader::load_dynamic_content(&mut self.driver, &self.config.loader).await;
            if round > 1 && !load.made_progress() {
                ::log::info!("Page {} converged after {} rounds", page_number, round - 1);
                break;
            }

            self.transition(CrawlState::Extracting);
            match self.extract(&page_url, page_number).await {
                Ok(page) => {
                    let count = page.content.len();
                    match best.as_ref().map(|previous| previous.content.len()) {
                        Some(best_count) if count <= best_count => {
                            ::log::info!(
                                "Round {} found {} records (best {}), keeping the earlier result",
                                round,
                                count,
                                best_count
                            );
                            break;
                        }
                        _ => {
                            ::log::info!("Round {}: {} records", round, count);
                            best = Some(page);
                        }
                    }
                }
                Err(e) if round == 1 => {
                    return self.abandon(first_page, e.into());
                }
                Err(e) => {
                    ::log::info!("Round {} extracted nothing ({}), keeping the earlier result", round, e);
                    break;
                }
            }

            if refine && self.should_refine(&load, round, budget) {
                refine = self.refine(&page_url, budget).await;
            }
        }

        match best {
            Some(page) => {
                self.pages.push(page);
                Ok(PageOutcome::Finished(page_url))
            }
            None => Ok(PageOutcome::Abandoned),
        }
    }

    fn abandon(&mut self, first_page: bool, error: CrawlError) -> Result<PageOutcome, CrawlError> {
        if first_page {
            return Err(error);
        }
        ::log::warn!("Abandoning page: {}", error);
        Ok(PageOutcome::Abandoned)
    }

    /// URL the driver actually ended up on (after redirects)
    async fn landed_url(&mut self, requested: &Url) -> Url {
        match self.driver.current_url().await {
            Ok(current) => Url::parse(&current).unwrap_or_else(|_| requested.clone()),
            Err(e) => {
                ::log::debug!("Could not read current URL: {}", e);
                requested.clone()
            }
        }
    }

    /// Summarizes the page, asks the oracle and decodes its answer. The oracle
    /// call is cut off where the budget's safety margin begins.
    async fn analyze(&mut self, page_url: &Url, html: &str, budget: &Budget) -> Result<Strategy, CrawlError> {
        self.transition(CrawlState::AnalyzingStrategy);

        let title = self.driver.title().await.unwrap_or_default();
        let summary = summarize(html, page_url.as_str(), &title);
        let prompt = build_prompt(&summary);
        let image = self.screenshot().await;

        let allowed = budget.working_time();
        let response = tokio::time::timeout(allowed, self.oracle.ask(&prompt, image.as_ref()))
            .await
            .map_err(|_| OracleError::Timeout(allowed.as_secs()))??;
        let strategy = decode_strategy(&response)?;
        ::log::info!(
            "Strategy: {:?} page, items {:?}, container {:?}, {} fields, next {:?}",
            strategy.page_type,
            strategy.items_selector(),
            strategy.main_container(),
            strategy.extraction_fields.len(),
            strategy.next_selector()
        );
        Ok(strategy)
    }

    async fn screenshot(&mut self) -> Option<InlineImage> {
        if !self.config.attach_screenshot || !self.driver.capabilities().screenshots {
            return None;
        }
        match self.driver.screenshot().await {
            Ok(png) => Some(InlineImage::png(png)),
            Err(e) => {
                ::log::warn!("Screenshot failed, asking without it: {}", e);
                None
            }
        }
    }

    fn should_refine(&self, load: &LoadOutcome, round: usize, budget: &Budget) -> bool {
        load.made_progress() && round < self.config.max_rounds && budget.allows(self.config.refine_margin())
    }

    /// Re-consults the oracle on the grown page. Returns whether further
    /// refinement is worthwhile on this page.
    async fn refine(&mut self, page_url: &Url, budget: &Budget) -> bool {
        let html = self.driver.source().await.unwrap_or_default();
        match self.analyze(page_url, &html, budget).await {
            Ok(strategy) => {
                self.strategy = Some(strategy);
                true
            }
            Err(e) => {
                ::log::warn!("Strategy refinement failed, keeping the current strategy: {}", e);
                false
            }
        }
    }

    async fn extract(&mut self, page_url: &Url, page_number: usize) -> Result<PageResult, ExtractError> {
        let html = match self.driver.source().await {
            Ok(html) => html,
            Err(e) => {
                ::log::warn!("Could not read page source: {}", e);
                String::new()
            }
        };
        let title = self.driver.title().await.unwrap_or_default();
        let strategy = self.strategy.clone().unwrap_or_default();
        extract_page(&html, page_url, &title, &strategy, page_number)
    }

    /// Next unvisited page, if pagination continues
    async fn next_page(&mut self, current: &Url) -> Option<Url> {
        let strategy = self.strategy.as_ref()?;
        let next = find_next_page(&mut self.driver, current, strategy).await?;
        if next.as_str() == current.as_str() {
            ::log::info!("Next link points at the current page, stopping");
            return None;
        }
        if self.visited.contains(next.as_str()) {
            ::log::info!("Next page {} was already visited, stopping", next);
            return None;
        }
        ::log::info!("Next page: {}", next);
        Some(next)
    }

    fn transition(&mut self, next: CrawlState) {
        if self.state != next {
            ::log::debug!("Crawl state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
