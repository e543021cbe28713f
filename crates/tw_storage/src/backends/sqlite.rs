use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::debug;
use tw_core::{Article, ArticleStore, Error, InsertOutcome, Result};
use crate::{BackendConfig, StorageBackend};

/// Schema migrations, `{table}` is the configured collection.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS {table} (
        url TEXT PRIMARY KEY NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS {table}_created_at ON {table} (created_at)",
];

/// Articles in a SQLite table. The primary key on `url` is what decides
/// `Duplicate`, so concurrent sessions cannot store the same url twice.
pub struct SQLiteStorage {
    pool: SqlitePool,
    table: String,
}

fn storage_err(context: &str, e: sqlx::Error) -> Error {
    Error::Storage(format!("{}: {}", context, e))
}

impl SQLiteStorage {
    pub async fn connect_with(url: &str, table: &str) -> Result<Self> {
        if !url.starts_with("sqlite:") {
            return Err(Error::Config(format!("sqlite backend expects a sqlite: url, got '{}'", url)));
        }
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| Error::Config(format!("invalid sqlite url '{}': {}", url, e)))?
            .create_if_missing(true);

        // Each connection to `:memory:` opens its own database, so keep exactly one alive.
        let mut pool_options = SqlitePoolOptions::new();
        if url.contains(":memory:") || url.contains("mode=memory") {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| storage_err("Failed to connect to database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(&migration.replace("{table}", table))
                .execute(&pool)
                .await
                .map_err(|e| storage_err(&format!("Failed to run migration {}", i), e))?;
        }

        debug!(%url, %table, "SQLite migrations applied");
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    fn row_to_article(row: &SqliteRow) -> Result<Article> {
        let created_at: String = row.get("created_at");
        Ok(Article {
            url: row.get("url"),
            title: row.get("title"),
            content: row.get("content"),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| Error::Storage(format!("Failed to parse date '{}': {}", created_at, e)))?
                .with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be reachable at the configured url"
    }

    async fn connect(config: &BackendConfig) -> Result<Self> {
        config.validate_collection()?;
        Self::connect_with(&config.url, &config.collection).await
    }
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn exists(&self, url: &str) -> Result<bool> {
        let row = sqlx::query(&format!("SELECT 1 FROM {} WHERE url = ? LIMIT 1", self.table))
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to look up article", e))?;
        Ok(row.is_some())
    }

    async fn insert(&self, article: &Article) -> Result<InsertOutcome> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {} (url, title, content, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            "#,
            self.table
        ))
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("Failed to store article", e))?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS total FROM {}", self.table))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage_err("Failed to count articles", e))?;
        let total: i64 = row.get("total");
        Ok(total as usize)
    }

    async fn list_articles(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query(&format!(
            "SELECT url, title, content, created_at FROM {} ORDER BY created_at ASC",
            self.table
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("Failed to list articles", e))?;

        rows.iter().map(Self::row_to_article).collect()
    }
}
