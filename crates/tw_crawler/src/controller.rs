//! The crawl session: walk listing pages, fetch unseen articles, store the new ones.
//!
//! A session moves through these states:
//!
//! ```text
//! Paging(page) ──fetch listing──▶ ExtractingLinks(page, links) ──unseen link──▶ FetchingArticle
//!      ▲                                   │        ▲                                   │
//!      └──────────── page + 1 ─────────────┘        └───────── skip / stored ───────────┘
//! ```
//!
//! and ends in `Done` when the listing runs dry, the article budget is met or
//! the page ceiling is reached. Failed article fetches are skipped, a store
//! error aborts the session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument};
use tw_core::{Article, ArticleStore, CrawlConfig, InsertOutcome, Result};
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::logging::Logger;
use crate::scheduler::ScheduledJob;
use crate::scrapers::TagPageScraper;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A listing page had no item blocks, or could not be fetched
    Exhausted,
    /// The article budget was met
    BudgetMet,
    /// `max_pages` listing pages were visited
    PageLimit,
}

/// Who started a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOrigin {
    Manual,
    Scheduled,
}

impl fmt::Display for RunOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOrigin::Manual => write!(f, "manual"),
            RunOrigin::Scheduled => write!(f, "scheduled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlReport {
    pub origin: RunOrigin,
    /// New articles written to the store
    pub stored: usize,
    /// Links the store already had
    pub duplicates: usize,
    /// Article fetches that failed and were skipped
    pub failed: usize,
    pub pages_visited: usize,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

enum CrawlState {
    Paging { page: usize },
    ExtractingLinks { page: usize, links: VecDeque<String> },
    FetchingArticle { page: usize, links: VecDeque<String>, url: String },
    Done(StopReason),
}

/// Per-invocation bookkeeping, dropped when the session returns.
#[derive(Default)]
struct Session {
    seen: HashSet<String>,
    stored: usize,
    duplicates: usize,
    failed: usize,
    pages_visited: usize,
}

pub struct CrawlController {
    config: CrawlConfig,
    scraper: TagPageScraper,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn ArticleStore>,
}

impl CrawlController {
    /// Validates the configuration up front so a bad template or selector never reaches a session.
    pub fn new(
        config: CrawlConfig,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn ArticleStore>,
    ) -> Result<Self> {
        config.validate()?;
        let scraper = TagPageScraper::new(&config)?;
        Ok(Self {
            config,
            scraper,
            fetcher,
            store,
        })
    }

    /// Controller talking to the live site over HTTP.
    pub fn with_http(config: CrawlConfig, store: Arc<dyn ArticleStore>) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        Self::new(config, fetcher, store)
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ArticleStore> {
        &self.store
    }

    /// Run one session to completion.
    #[instrument(level = "info", skip(self), fields(listing = %self.config.listing_url))]
    pub async fn run(&self, origin: RunOrigin) -> Result<CrawlReport> {
        let logger = Logger::new()
            .with_prefix("🦗".to_string())
            .with_prefix(format!("[{}]", origin));
        let started_at = Utc::now();
        logger.info(&format!("Starting crawl at {}", started_at.format("%Y-%m-%d %H:%M:%S")));

        let mut session = Session::default();
        let mut state = CrawlState::Paging { page: 1 };

        let stop_reason = loop {
            state = match state {
                CrawlState::Paging { page } => self.next_page(page, &mut session, &logger).await,
                CrawlState::ExtractingLinks { page, mut links } => {
                    if self.config.budget_met(session.stored) {
                        CrawlState::Done(StopReason::BudgetMet)
                    } else if let Some(url) = links.pop_front() {
                        if !session.seen.insert(url.clone()) {
                            CrawlState::ExtractingLinks { page, links }
                        } else if self.store.exists(&url).await? {
                            session.duplicates += 1;
                            logger.debug(&format!("[=] Already stored: {}", url));
                            CrawlState::ExtractingLinks { page, links }
                        } else {
                            CrawlState::FetchingArticle { page, links, url }
                        }
                    } else {
                        CrawlState::Paging { page: page + 1 }
                    }
                }
                CrawlState::FetchingArticle { page, links, url } => {
                    self.fetch_and_store(&url, &mut session, &logger).await?;
                    CrawlState::ExtractingLinks { page, links }
                }
                CrawlState::Done(reason) => break reason,
            };
        };

        let report = CrawlReport {
            origin,
            stored: session.stored,
            duplicates: session.duplicates,
            failed: session.failed,
            pages_visited: session.pages_visited,
            stop_reason,
            started_at,
            finished_at: Utc::now(),
        };
        logger.info(&format!(
            "✅ Crawl finished ({:?}): {} new, {} already stored, {} failed, {} pages",
            report.stop_reason, report.stored, report.duplicates, report.failed, report.pages_visited
        ));
        Ok(report)
    }

    async fn next_page(&self, page: usize, session: &mut Session, logger: &Logger) -> CrawlState {
        if page > self.config.max_pages {
            return CrawlState::Done(StopReason::PageLimit);
        }
        if page > 1 && !self.config.politeness_delay.is_zero() {
            tokio::time::sleep(self.config.politeness_delay).await;
        }

        let page_url = self.config.page_url(page);
        let listing = match self.fetcher.fetch(&page_url).await {
            Ok(html) => self.scraper.extract_links(&html, &page_url),
            Err(e) => Err(e),
        };
        session.pages_visited += 1;

        match listing {
            Ok(listing) if listing.is_exhausted() => {
                logger.info(&format!("❌ No articles found on {}", page_url));
                CrawlState::Done(StopReason::Exhausted)
            }
            Ok(listing) => {
                logger.info(&format!(
                    "📄 Page {}: {} items, {} links",
                    page,
                    listing.item_count,
                    listing.links.len()
                ));
                CrawlState::ExtractingLinks {
                    page,
                    links: listing.links.into(),
                }
            }
            Err(e) => {
                logger.warn(&format!("Failed to load listing {}: {}", page_url, e));
                CrawlState::Done(StopReason::Exhausted)
            }
        }
    }

    /// Fetch failures are counted and swallowed, store failures propagate.
    async fn fetch_and_store(&self, url: &str, session: &mut Session, logger: &Logger) -> Result<()> {
        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                session.failed += 1;
                logger.warn(&format!("[ERROR] Failed to fetch article {}: {}", url, e));
                return Ok(());
            }
        };

        let article = Article::new(url, self.scraper.parse_article(&html));
        let outcome = match self.store.insert(&article).await {
            Ok(outcome) => outcome,
            Err(e) => {
                logger.error(&format!("Failed to store {}: {}", url, e));
                return Err(e);
            }
        };
        match outcome {
            InsertOutcome::Inserted => {
                session.stored += 1;
                logger.info(&format!("[✓] Stored: {}", article.title));
            }
            InsertOutcome::Duplicate => {
                session.duplicates += 1;
                logger.info(&format!("[=] Already stored: {}", article.title));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ScheduledJob for CrawlController {
    async fn execute(&self) {
        match self.run(RunOrigin::Scheduled).await {
            Ok(report) => info!(stored = report.stored, reason = ?report.stop_reason, "Scheduled crawl done"),
            Err(e) => error!(error = %e, "Scheduled crawl aborted"),
        }
    }
}
