use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use super::types::StorageError;

/// Default bound for a single storage operation
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
    op_timeout: Duration,
}

impl Database {
    /// Open a connection pool with the default storage timeout.
    ///
    /// Does not touch the schema; call [`Database::ensure_schema`] before
    /// the first read or write.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        Self::open_with_timeout(path, DEFAULT_STORAGE_TIMEOUT).await
    }

    /// Open a connection pool whose operations are each bounded by `op_timeout`
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Busy` if the file is locked past the busy timeout,
    /// `StorageError::Other` for any other connection failure.
    pub async fn open_with_timeout(path: &str, op_timeout: Duration) -> Result<Self, StorageError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: SQLite waits up to 5 seconds for a writer to release
        // its lock before returning SQLITE_BUSY. Applied to every pooled connection.
        let mut options = SqliteConnectOptions::from_str(&url)
            .map_err(StorageError::from_sqlx)?
            .pragma("busy_timeout", "5000");

        // WAL lets readers proceed while the ingestion run holds the write lock
        if path != ":memory:" {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // One ingestion writer plus a handful of concurrent queries
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StorageError::from_sqlx)?;

        tracing::debug!(path = %path, timeout = ?op_timeout, "Opened article database");
        Ok(Self { pool, op_timeout })
    }

    /// Per-operation timeout applied by [`Database::bounded`]
    pub fn op_timeout(&self) -> Duration {
        self.op_timeout
    }

    /// Run a storage future under the configured timeout
    pub(crate) async fn bounded<T, F>(&self, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| StorageError::Timeout(self.op_timeout))?
    }

    /// Create the article table and its indexes if they are missing.
    ///
    /// Every statement uses `IF NOT EXISTS` and the whole set runs in one
    /// transaction, so calling this at the start of every ingestion run is a
    /// no-op once the schema exists.
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        self.bounded(async {
            self.create_schema().await.map_err(|e| match StorageError::from_sqlx(e) {
                StorageError::Other(e) => StorageError::Schema(e.to_string()),
                other => other,
            })
        })
        .await
    }

    async fn create_schema(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // url carries the uniqueness guarantee the load step relies on
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news_articles (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT 'Unknown',
                description TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL UNIQUE,
                image_url TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL DEFAULT '',
                country TEXT NOT NULL DEFAULT '',
                published_at TEXT,
                title_folded TEXT NOT NULL DEFAULT '',
                description_folded TEXT NOT NULL DEFAULT ''
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Filter and sort paths of the query engine
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_articles_published_at ON news_articles(published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_articles_category ON news_articles(category)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_articles_language ON news_articles(language)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
