use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tw_core::{Article, ArticleStore, Error, InsertOutcome, Result};
use crate::{BackendConfig, StorageBackend};

#[derive(Default)]
struct MemoryStore {
    urls: HashSet<String>,
    articles: Vec<Article>,
}

/// Process-local store. The url set and the article list share one lock, so
/// the existence check and the insert cannot interleave with another writer.
#[derive(Default)]
pub struct InMemoryStorage {
    store: RwLock<MemoryStore>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn connect(config: &BackendConfig) -> Result<Self> {
        if !config.url.starts_with("memory:") {
            return Err(Error::Config(format!(
                "memory backend expects a memory:// url, got '{}'",
                config.url
            )));
        }
        Ok(Self::new())
    }
}

#[async_trait]
impl ArticleStore for InMemoryStorage {
    async fn exists(&self, url: &str) -> Result<bool> {
        Ok(self.store.read().await.urls.contains(url))
    }

    async fn insert(&self, article: &Article) -> Result<InsertOutcome> {
        let mut store = self.store.write().await;
        if !store.urls.insert(article.url.clone()) {
            return Ok(InsertOutcome::Duplicate);
        }
        store.articles.push(article.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.store.read().await.articles.len())
    }

    async fn list_articles(&self) -> Result<Vec<Article>> {
        let mut articles = self.store.read().await.articles.clone();
        articles.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use chrono::{Duration, Utc};

    fn article(url: &str) -> Article {
        Article {
            url: url.to_string(),
            title: "Test Article".to_string(),
            content: "This is a test article about fashion.".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_duplicate() {
        let storage = InMemoryStorage::new();
        assert!(!storage.exists("http://test.com/a").await.unwrap());

        let outcome = storage.insert(&article("http://test.com/a")).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert!(storage.exists("http://test.com/a").await.unwrap());

        let outcome = storage.insert(&article("http://test.com/a")).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Duplicate);
        assert_eq!(storage.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_store_once() {
        let storage = Arc::new(InMemoryStorage::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = storage.clone();
                tokio::spawn(async move { storage.insert(&article("http://test.com/race")).await })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == InsertOutcome::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(storage.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_oldest_first() {
        let storage = InMemoryStorage::new();
        let mut newer = article("http://test.com/new");
        newer.created_at = Utc::now();
        let mut older = article("http://test.com/old");
        older.created_at = newer.created_at - Duration::hours(2);

        storage.insert(&newer).await.unwrap();
        storage.insert(&older).await.unwrap();

        let urls: Vec<_> = storage
            .list_articles()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.url)
            .collect();
        assert_eq!(urls, vec!["http://test.com/old", "http://test.com/new"]);
    }

    #[tokio::test]
    async fn test_connect_rejects_foreign_url() {
        let config = BackendConfig::new("sqlite://x.db", "articles");
        assert!(InMemoryStorage::connect(&config).await.is_err());
    }
}
