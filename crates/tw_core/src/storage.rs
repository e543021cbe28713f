use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::types::Article;
use crate::Result;

/// Result of handing an article to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertOutcome {
    Inserted,
    /// The url was already stored. Expected during normal crawling.
    Duplicate,
}

/// The store is the only authority on whether an article was already collected.
///
/// Implementations must enforce url uniqueness themselves: two sessions racing
/// on the same url both see `exists == false`, and only one `insert` may
/// report `Inserted`. Failures to reach the backing store are errors, never
/// `Duplicate`.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Whether an article with this url is stored
    async fn exists(&self, url: &str) -> Result<bool>;

    /// Store an article unless its url is already present
    async fn insert(&self, article: &Article) -> Result<InsertOutcome>;

    /// Number of stored articles
    async fn count(&self) -> Result<usize>;

    /// All stored articles, oldest first
    async fn list_articles(&self) -> Result<Vec<Article>>;
}
