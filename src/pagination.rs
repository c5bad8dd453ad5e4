use crate::drivers::PageDriver;
use crate::error::DriverError;
use crate::filter::{is_same_host, resolve_href};
use crate::strategy::Strategy;
use url::Url;

/// Finds the next page of `current` using the strategy's next-page selector.
///
/// Returns `None` when the selector is unset, matches nothing visible, has an
/// unfollowable href, or points at another host. Driver errors end pagination
/// rather than the crawl.
pub async fn find_next_page<D: PageDriver>(
    driver: &mut D,
    current: &Url,
    strategy: &Strategy,
) -> Option<Url> {
    let selector = strategy.next_selector()?;
    match next_href(driver, selector).await {
        Ok(Some(href)) => {
            let next = resolve_href(current, &href)?;
            if !is_same_host(&next, current) {
                ::log::info!("Next link {} leaves {}, not following", next, current.host_str().unwrap_or_default());
                return None;
            }
            Some(next)
        }
        Ok(None) => {
            ::log::debug!("No visible next link for selector {}", selector);
            None
        }
        Err(e) => {
            ::log::warn!("Next page lookup failed: {}", e);
            None
        }
    }
}

async fn next_href<D: PageDriver>(driver: &mut D, selector: &str) -> Result<Option<String>, DriverError> {
    let Some(element) = driver.query_one(selector).await? else {
        return Ok(None);
    };
    if !driver.is_visible(&element).await? {
        return Ok(None);
    }
    driver.attribute(&element, "href").await
}
