use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An article as persisted in the dedup store. `url` is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Stamp freshly fetched content with the current time.
    pub fn new(url: impl Into<String>, content: ArticleContent) -> Self {
        Self {
            url: url.into(),
            title: content.title,
            content: content.content,
            created_at: Utc::now(),
        }
    }
}

/// What the fetcher pulls out of a single article page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleContent {
    pub title: String,
    pub content: String,
}
