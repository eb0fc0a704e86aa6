//! One ingestion run: ensure schema, fetch, transform, load.
//!
//! The pipeline never retries. A failed run reports which step failed and
//! whether the fault looks transient; re-running is the trigger's decision.
//! Because the load is a single idempotent upsert transaction, re-running
//! after any failure converges to the same stored state.

use thiserror::Error;

use crate::feed::{transform, FeedSource, FetchError, Transformed};
use crate::storage::{ArticleStore, NewArticle, StorageError};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum IngestError {
    /// The article table or its indexes could not be created
    #[error("Schema setup failed: {0}")]
    Schema(#[source] StorageError),

    /// Nothing was written
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The load transaction failed and was rolled back
    #[error("Load of {attempted} articles failed ({fetched} fetched): {source}")]
    Load {
        fetched: usize,
        attempted: usize,
        #[source]
        source: StorageError,
    },
}

impl IngestError {
    /// Name of the step that failed, for logs and exit reporting
    pub fn step(&self) -> &'static str {
        match self {
            IngestError::Schema(_) => "schema",
            IngestError::Fetch(_) => "fetch",
            IngestError::Load { .. } => "load",
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            IngestError::Schema(err) => err.is_transient(),
            IngestError::Fetch(err) => err.is_transient(),
            IngestError::Load { source, .. } => source.is_transient(),
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// What one successful run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Entries returned by the feed
    pub fetched: usize,
    /// Rows inserted or overwritten
    pub loaded: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Entries collapsed into a later entry with the same URL
    pub duplicates_in_batch: usize,
    /// Entries loaded under the empty URL; they share a single row
    pub without_url: usize,
    /// Entries whose publication date could not be parsed (stored undated)
    pub date_warnings: usize,
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline<F, S> {
    source: F,
    store: S,
}

impl<F, S> Pipeline<F, S>
where
    F: FeedSource,
    S: ArticleStore,
{
    pub fn new(source: F, store: S) -> Self {
        Self { source, store }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Execute one run.
    ///
    /// Dropping the returned future mid-load rolls back the open transaction,
    /// leaving the store as it was before the run.
    pub async fn run(&self) -> Result<IngestReport, IngestError> {
        self.store.ensure_schema().await.map_err(IngestError::Schema)?;

        let raw = self.source.fetch_articles().await?;
        let fetched = raw.len();
        tracing::info!(fetched = fetched, "Fetched articles");

        if raw.is_empty() {
            tracing::info!("Feed returned no articles, nothing to load");
            return Ok(IngestReport::default());
        }

        let mut report = IngestReport {
            fetched,
            ..IngestReport::default()
        };

        let mut batch: Vec<NewArticle> = Vec::with_capacity(fetched);
        for (position, entry) in raw.iter().enumerate() {
            let Transformed { article, warnings } = transform(entry);

            for warning in &warnings {
                tracing::warn!(position = position, url = %article.url, "{warning}");
            }
            report.date_warnings += warnings.len();

            if article.url.is_empty() {
                tracing::warn!(
                    position = position,
                    title = %article.title,
                    "Article has no URL, loading under the empty key"
                );
                report.without_url += 1;
            }
            batch.push(article);
        }

        let attempted = batch.len();
        let summary = self
            .store
            .upsert_articles(&batch)
            .await
            .map_err(|source| IngestError::Load {
                fetched,
                attempted,
                source,
            })?;

        report.loaded = summary.loaded();
        report.inserted = summary.inserted;
        report.updated = summary.updated;
        report.duplicates_in_batch = summary.duplicates_in_batch;

        tracing::info!(
            fetched = report.fetched,
            loaded = report.loaded,
            inserted = report.inserted,
            updated = report.updated,
            duplicates = report.duplicates_in_batch,
            without_url = report.without_url,
            date_warnings = report.date_warnings,
            "Ingestion complete"
        );
        Ok(report)
    }
}
