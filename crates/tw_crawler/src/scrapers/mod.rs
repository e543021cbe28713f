//! HTML extraction for tag listing pages and the articles they link to.

pub mod tag_page;

pub use tag_page::{ListingPage, TagPageScraper, NO_TITLE};

/// Common utilities for scrapers
pub(crate) mod utils {
    use scraper::{ElementRef, Html, Selector};
    use tw_core::{Error, Result};
    use url::Url;

    pub fn parse_selector(selector: &str) -> Result<Selector> {
        Selector::parse(selector)
            .map_err(|e| Error::Config(format!("Invalid selector '{}': {}", selector, e)))
    }

    pub fn parse_url(url: &str) -> Result<Url> {
        Url::parse(url).map_err(|e| Error::Scraping(format!("Failed to parse URL '{}': {}", url, e)))
    }

    pub fn element_text(element: ElementRef<'_>) -> String {
        element.text().collect::<String>()
    }

    /// Text of the first match, if any.
    pub fn extract_text(document: &Html, selector: &Selector) -> Option<String> {
        document.select(selector).next().map(element_text)
    }

    /// Text of every match, in document order.
    pub fn extract_texts(document: &Html, selector: &Selector) -> Vec<String> {
        document.select(selector).map(element_text).collect()
    }
}
