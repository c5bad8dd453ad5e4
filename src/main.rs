use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use strategy_scrape::{Backend, Scraper};

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    ::log::info!("Scraping {} into {}", args.url, args.output.display());

    let scraper = match build_scraper(&args) {
        Ok(scraper) => scraper,
        Err(e) => {
            ::log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if scraper.config().backend == Backend::Browser {
        ::log::info!(
            "Browser backend needs a WebDriver server (e.g. ChromeDriver) at {}",
            scraper.config().webdriver_url
        );
    }

    let started = std::time::Instant::now();
    let result = match scraper.run().await {
        Ok(result) => result,
        Err(e) => {
            ::log::error!("Scrape failed: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                ::log::error!("  caused by: {}", cause);
                source = cause.source();
            }
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = result.write_to(&args.output) {
        ::log::error!("Failed to write {}: {}", args.output.display(), e);
        return ExitCode::FAILURE;
    }

    ::log::info!(
        "Scraping complete - {} pages, {} records in {:.2} seconds",
        result.pages().len(),
        result.total_records(),
        started.elapsed().as_secs_f64()
    );
    ExitCode::SUCCESS
}

/// Config file first, then command-line overrides
fn build_scraper(args: &Args) -> Result<Scraper, Box<dyn Error>> {
    let mut scraper = Scraper::new(&args.url);
    if let Some(path) = &args.config {
        scraper = scraper.with_config_file(path)?;
    }
    if let Some(backend) = args.backend {
        scraper = scraper.with_backend(backend.into());
    }
    if let Some(seconds) = args.time_limit {
        scraper = scraper.with_time_limit(seconds);
    }
    if let Some(max_pages) = args.max_pages {
        scraper = scraper.with_max_pages(max_pages);
    }
    if let Some(webdriver_url) = &args.webdriver_url {
        scraper = scraper.with_webdriver_url(webdriver_url);
    }
    Ok(scraper)
}
