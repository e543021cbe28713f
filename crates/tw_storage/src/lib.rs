use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use tw_core::{ArticleStore, Error, Result};

pub mod backends;

pub use backends::*;

pub const DEFAULT_COLLECTION: &str = "articles";

#[async_trait]
pub trait StorageBackend: ArticleStore + Sized {
    fn get_error_message() -> &'static str;
    async fn connect(config: &BackendConfig) -> Result<Self>;
}

/// Where a backend lives and which collection it keeps articles in.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: String,
    pub collection: String,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            collection: collection.into(),
        }
    }

    /// Collection names end up in SQL, keep them to plain identifiers.
    pub fn validate_collection(&self) -> Result<()> {
        let valid = !self.collection.is_empty()
            && self.collection.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !self.collection.starts_with(|c: char| c.is_ascii_digit());
        if valid {
            Ok(())
        } else {
            Err(Error::Config(format!("invalid collection name '{}'", self.collection)))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl StorageKind {
    pub fn default_url(&self) -> &'static str {
        match self {
            StorageKind::Memory => "memory://",
            #[cfg(feature = "sqlite")]
            StorageKind::Sqlite => "sqlite://articles.db",
        }
    }
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            #[cfg(feature = "sqlite")]
            "sqlite" => Ok(StorageKind::Sqlite),
            other => Err(Error::Config(format!("unknown storage backend '{}'", other))),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Memory => write!(f, "memory"),
            #[cfg(feature = "sqlite")]
            StorageKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

async fn open<T: StorageBackend + 'static>(config: &BackendConfig) -> Result<Arc<dyn ArticleStore>> {
    let storage = T::connect(config).await.map_err(|e| match e {
        Error::Config(_) => e,
        e => Error::Storage(format!("{} ({})", T::get_error_message(), e)),
    })?;
    Ok(Arc::new(storage))
}

/// Open the configured backend. Connection problems surface here, before any crawl starts.
pub async fn create_storage(
    kind: StorageKind,
    url: Option<&str>,
    collection: Option<&str>,
) -> Result<Arc<dyn ArticleStore>> {
    let config = BackendConfig::new(
        url.unwrap_or(kind.default_url()),
        collection.unwrap_or(DEFAULT_COLLECTION),
    );
    config.validate_collection()?;

    let storage = match kind {
        StorageKind::Memory => open::<InMemoryStorage>(&config).await?,
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => open::<SQLiteStorage>(&config).await?,
    };
    info!(backend = %kind, collection = %config.collection, "🏦 Storage backend ready");
    Ok(storage)
}
