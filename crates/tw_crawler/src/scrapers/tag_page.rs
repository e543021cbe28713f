use scraper::{Html, Selector};
use tracing::debug;
use tw_core::{ArticleContent, CrawlConfig, Result};
use super::utils;

/// Title used when an article page has no `h1`.
pub const NO_TITLE: &str = "No Title";

/// What one listing page yielded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Item blocks found, with or without a usable link. Zero means the tag ran out of pages.
    pub item_count: usize,
    /// Absolute article urls in page order
    pub links: Vec<String>,
}

impl ListingPage {
    pub fn is_exhausted(&self) -> bool {
        self.item_count == 0
    }
}

/// Extracts article links from a tag listing page and article text from article pages.
#[derive(Debug, Clone)]
pub struct TagPageScraper {
    item_selector: Selector,
    link_selector: Selector,
    title_selector: Selector,
    paragraph_selector: Selector,
}

impl TagPageScraper {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        Ok(Self {
            item_selector: utils::parse_selector(&config.item_selector)?,
            link_selector: utils::parse_selector(&config.link_selector)?,
            title_selector: utils::parse_selector("h1")?,
            paragraph_selector: utils::parse_selector("p")?,
        })
    }

    /// Collect the article link of every item block, resolved against `page_url`.
    pub fn extract_links(&self, html: &str, page_url: &str) -> Result<ListingPage> {
        let base = utils::parse_url(page_url)?;
        let document = Html::parse_document(html);

        let mut page = ListingPage::default();
        for item in document.select(&self.item_selector) {
            page.item_count += 1;

            let href = item
                .select(&self.link_selector)
                .find_map(|link| link.value().attr("href"))
                .map(str::trim)
                .filter(|href| !href.is_empty());
            let Some(href) = href else {
                debug!(%page_url, item = page.item_count, "Item block without article link");
                continue;
            };

            match base.join(href) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => page.links.push(url.to_string()),
                Ok(url) => debug!(%url, "Skipping non-http link"),
                Err(e) => debug!(%href, error = %e, "Skipping unresolvable link"),
            }
        }

        Ok(page)
    }

    /// Title from the first `h1`, content from every `p` joined by newlines.
    pub fn parse_article(&self, html: &str) -> ArticleContent {
        let document = Html::parse_document(html);

        let title = utils::extract_text(&document, &self.title_selector)
            .map(|title| title.trim().to_string())
            .unwrap_or_else(|| NO_TITLE.to_string());

        let content = utils::extract_texts(&document, &self.paragraph_selector).join("\n");

        ArticleContent { title, content }
    }
}
