use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use strategy_scrape::Backend;

#[derive(Parser, Debug)]
#[command(name = "strategy-scrape")]
#[command(about = "Scrapes pages of unknown structure with strategies proposed by a language model")]
#[command(version)]
pub struct Args {
    /// Page to start scraping from
    pub url: String,

    /// File the JSON result is written to
    pub output: PathBuf,

    /// Page access backend (overrides the config file)
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendArg>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Total time budget in seconds
    #[arg(long)]
    pub time_limit: Option<u64>,

    /// Maximum number of pages to follow
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// URL of the WebDriver server
    #[arg(long)]
    pub webdriver_url: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Browser,
    Static,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Browser => Backend::Browser,
            BackendArg::Static => Backend::Static,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_and_flags() {
        let args = Args::parse_from([
            "strategy-scrape",
            "https://x.test/",
            "out.json",
            "--backend",
            "static",
            "--time-limit",
            "90",
        ]);
        assert_eq!(args.url, "https://x.test/");
        assert_eq!(args.output, PathBuf::from("out.json"));
        assert_eq!(args.backend.map(Backend::from), Some(Backend::Static));
        assert_eq!(args.time_limit, Some(90));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_output_is_required() {
        assert!(Args::try_parse_from(["strategy-scrape", "https://x.test/"]).is_err());
    }
}
