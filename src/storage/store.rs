use async_trait::async_trait;

use super::schema::Database;
use super::types::{ArticlePage, LoadSummary, NewArticle, StorageError};
use crate::query::QuerySpec;

/// Storage contract shared by the ingestion pipeline and the query surface.
///
/// Implementations must tolerate concurrent callers: many simultaneous
/// queries plus at most one ingestion run.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Create the article table, its `url` uniqueness constraint and indexes
    /// if absent. Safe to call on every run.
    async fn ensure_schema(&self) -> Result<(), StorageError>;

    /// Insert or overwrite articles keyed by `url`, as one batch
    async fn upsert_articles(&self, batch: &[NewArticle]) -> Result<LoadSummary, StorageError>;

    /// Count all matches for `spec` and return the requested page
    async fn query_articles(&self, spec: &QuerySpec) -> Result<ArticlePage, StorageError>;
}

#[async_trait]
impl ArticleStore for Database {
    async fn ensure_schema(&self) -> Result<(), StorageError> {
        Database::ensure_schema(self).await
    }

    async fn upsert_articles(&self, batch: &[NewArticle]) -> Result<LoadSummary, StorageError> {
        Database::upsert_articles(self, batch).await
    }

    async fn query_articles(&self, spec: &QuerySpec) -> Result<ArticlePage, StorageError> {
        Database::query_articles(self, spec).await
    }
}
