use clap::Args;
use std::str::FromStr;
use std::time::Duration;
use tw_core::config::{
    DEFAULT_ITEM_SELECTOR, DEFAULT_LINK_SELECTOR, DEFAULT_LISTING_URL, DEFAULT_USER_AGENT,
};
use tw_core::{CrawlConfig, Result};

/// A duration written like `1h`, `30m`, `1m30s` or a bare number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_millis = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;
        let mut chars = s.chars().peekable();

        while let Some(c) = chars.next() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let factor = match c {
                    'm' if chars.peek() == Some(&'s') => {
                        chars.next();
                        1
                    }
                    's' => 1_000,
                    'm' => 60_000,
                    'h' => 3_600_000,
                    'd' => 86_400_000,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_millis = num
                    .checked_mul(factor)
                    .and_then(|millis| total_millis.checked_add(millis))
                    .ok_or_else(|| format!("Duration too large: {}", s))?;
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // A trailing number without a unit counts as seconds
        if !current_number.is_empty() {
            let num = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_millis = num
                .checked_mul(1_000)
                .and_then(|millis| total_millis.checked_add(millis))
                .ok_or_else(|| format!("Duration too large: {}", s))?;
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_millis(total_millis)))
    }
}

/// Crawl settings shared by every command that starts sessions.
#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Listing page url, `{page}` is replaced by the page number
    #[arg(long, env = "TAGWATCH_LISTING_URL", default_value = DEFAULT_LISTING_URL)]
    pub listing_url: String,

    /// Stop after storing this many new articles (0 for no limit)
    #[arg(long, env = "TAGWATCH_MAX_ARTICLES", default_value_t = 50)]
    pub max_articles: usize,

    /// Never visit more than this many listing pages per session
    #[arg(long, env = "TAGWATCH_MAX_PAGES", default_value_t = 5)]
    pub max_pages: usize,

    /// Pause between listing pages (e.g. 1s, 500ms)
    #[arg(long, env = "TAGWATCH_DELAY", default_value = "1s")]
    pub delay: HumanDuration,

    /// Per-request timeout
    #[arg(long, env = "TAGWATCH_TIMEOUT", default_value = "30s")]
    pub timeout: HumanDuration,

    /// Extra attempts for a failed page fetch
    #[arg(long, env = "TAGWATCH_RETRIES", default_value_t = 0)]
    pub retries: u32,

    #[arg(long, env = "TAGWATCH_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// CSS selector for one article teaser on a listing page
    #[arg(long, default_value = DEFAULT_ITEM_SELECTOR)]
    pub item_selector: String,

    /// CSS selector, inside a teaser, for the article link
    #[arg(long, default_value = DEFAULT_LINK_SELECTOR)]
    pub link_selector: String,
}

impl CrawlArgs {
    /// Build and validate the session configuration.
    pub fn to_config(&self) -> Result<CrawlConfig> {
        let config = CrawlConfig {
            listing_url: self.listing_url.clone(),
            max_articles: (self.max_articles > 0).then_some(self.max_articles),
            max_pages: self.max_pages,
            politeness_delay: self.delay.0,
            request_timeout: self.timeout.0,
            fetch_retries: self.retries,
            user_agent: self.user_agent.clone(),
            item_selector: self.item_selector.clone(),
            link_selector: self.link_selector.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}
