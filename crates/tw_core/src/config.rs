use std::time::Duration;
use serde::{Deserialize, Serialize};
use url::Url;
use crate::{Error, Result};

/// Placeholder substituted with the 1-based page number in `listing_url`.
pub const PAGE_PLACEHOLDER: &str = "{page}";

pub const DEFAULT_LISTING_URL: &str = "https://www.kompasiana.com/tag/fashion?page={page}";
pub const DEFAULT_USER_AGENT: &str = "tagwatch/0.1 (+https://github.com/tagwatch/tagwatch)";
pub const DEFAULT_ITEM_SELECTOR: &str = "div.timeline--item";
pub const DEFAULT_LINK_SELECTOR: &str = "div.artikel--content h2 a[href]";

/// Everything one crawl session needs to know about the target site and its limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Listing page template, must contain `{page}`
    pub listing_url: String,
    /// Stop once this many new articles were stored. `None` means no article budget.
    pub max_articles: Option<usize>,
    /// Hard ceiling on listing pages visited per session
    pub max_pages: usize,
    /// Pause between listing page requests
    pub politeness_delay: Duration,
    pub request_timeout: Duration,
    /// Extra attempts for a failed fetch
    pub fetch_retries: u32,
    pub user_agent: String,
    /// Selector matching one article teaser on a listing page
    pub item_selector: String,
    /// Selector, relative to an item, matching the article link
    pub link_selector: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            max_articles: Some(50),
            max_pages: 5,
            politeness_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            fetch_retries: 0,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            item_selector: DEFAULT_ITEM_SELECTOR.to_string(),
            link_selector: DEFAULT_LINK_SELECTOR.to_string(),
        }
    }
}

impl CrawlConfig {
    /// Listing url for a 1-based page number.
    pub fn page_url(&self, page: usize) -> String {
        self.listing_url.replace(PAGE_PLACEHOLDER, &page.to_string())
    }

    /// Whether `stored` new articles exhaust the article budget.
    pub fn budget_met(&self, stored: usize) -> bool {
        self.max_articles.map_or(false, |max| stored >= max)
    }

    /// Reject configurations that could only fail once a session is underway.
    pub fn validate(&self) -> Result<()> {
        if !self.listing_url.contains(PAGE_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "listing url '{}' must contain {}",
                self.listing_url, PAGE_PLACEHOLDER
            )));
        }
        let first = Url::parse(&self.page_url(1))
            .map_err(|e| Error::Config(format!("invalid listing url '{}': {}", self.listing_url, e)))?;
        if !matches!(first.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "listing url must be http(s), got '{}'",
                first.scheme()
            )));
        }
        if self.max_pages == 0 {
            return Err(Error::Config("max pages must be at least 1".to_string()));
        }
        if self.max_articles == Some(0) {
            return Err(Error::Config("max articles must be at least 1".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be non-zero".to_string()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("user agent must not be empty".to_string()));
        }
        if self.item_selector.trim().is_empty() || self.link_selector.trim().is_empty() {
            return Err(Error::Config("item and link selectors must not be empty".to_string()));
        }
        Ok(())
    }
}
