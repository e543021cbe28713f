//! Crawling side of tagwatch: fetching pages, extracting links and article
//! text, running crawl sessions and scheduling them.

pub mod cli;
pub mod controller;
pub mod fetcher;
pub mod logging;
pub mod scheduler;
pub mod scrapers;

pub use cli::{CrawlArgs, HumanDuration};
pub use controller::{CrawlController, CrawlReport, RunOrigin, StopReason};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use logging::{init_logging, Logger};
pub use scheduler::{JobInfo, JobRegistry, ScheduleInterval, ScheduledJob};
pub use scrapers::{ListingPage, TagPageScraper};

/// Registry key of the periodic crawl.
pub const CRAWL_JOB: &str = "crawl";
