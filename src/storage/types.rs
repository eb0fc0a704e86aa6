use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage errors, classified so callers can tell transient faults from bugs
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another writer holds the database lock past the busy timeout
    #[error("Database is busy or locked by another writer")]
    Busy,

    /// The operation did not finish within the configured storage timeout
    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    /// Schema creation failed
    #[error("Schema setup failed: {0}")]
    Schema(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[source] sqlx::Error),
}

impl StorageError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
        {
            return StorageError::Busy;
        }

        StorageError::Other(err)
    }

    /// True for faults that an external retry can reasonably clear
    /// (lock contention, timeouts, lost connections).
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Busy | StorageError::Timeout(_) => true,
            StorageError::Schema(_) => false,
            StorageError::Other(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::from_sqlx(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A fully populated article ready to be loaded.
///
/// Produced by the transformer; every column already holds its defined
/// default, so the load step never has to invent values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub author: String,
    pub description: String,
    pub url: String,
    pub image_url: String,
    pub source: String,
    pub category: String,
    pub language: String,
    pub country: String,
    pub published_at: Option<NaiveDate>,
}

/// Article row as stored in `news_articles`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub description: String,
    pub url: String,
    pub image_url: String,
    pub source: String,
    pub category: String,
    pub language: String,
    pub country: String,
    pub published_at: Option<NaiveDate>,
}

/// Outcome of one batch upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Rows whose `url` was not present before the batch
    pub inserted: usize,
    /// Existing rows overwritten with the incoming values
    pub updated: usize,
    /// Entries dropped because an identical `url` appeared later in the batch
    pub duplicates_in_batch: usize,
}

impl LoadSummary {
    /// Rows written by the batch (inserted plus overwritten)
    pub fn loaded(&self) -> usize {
        self.inserted + self.updated
    }
}

/// One page of query results plus the pre-pagination match count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticlePage {
    pub total_items: i64,
    pub data: Vec<Article>,
}

impl ArticlePage {
    pub fn empty() -> Self {
        Self {
            total_items: 0,
            data: Vec::new(),
        }
    }
}
