//! Upstream news feed access: fetching the raw article list and turning each
//! entry into a storable article.
//!
//! - [`fetcher`] - the [`FeedSource`] seam and its HTTP implementation
//! - [`raw`] - loosely typed upstream entries
//! - [`transform`] - per-entry mapping to [`NewArticle`](crate::storage::NewArticle)

mod fetcher;
mod raw;
mod transform;

pub use fetcher::{
    build_client, FeedSource, FetchError, HttpFeedSource, DEFAULT_FETCH_TIMEOUT, DEFAULT_LIST_FIELD,
    DEFAULT_MAX_RESPONSE_BYTES,
};
pub use raw::RawArticle;
pub use transform::{parse_published_date, transform, TransformWarning, Transformed, UNKNOWN_AUTHOR};
