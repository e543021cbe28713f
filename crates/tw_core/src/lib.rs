pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::CrawlConfig;
pub use error::{Error, Result};
pub use storage::{ArticleStore, InsertOutcome};
pub use types::{Article, ArticleContent};
