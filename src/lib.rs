//! Batch ingestion of news articles from a JSON feed into SQLite, plus a
//! filtered, sorted and paginated read API over the stored articles.

pub mod config;
pub mod feed;
pub mod pipeline;
pub mod query;
pub mod storage;
