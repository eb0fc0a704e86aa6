mod articles;
mod query;
mod schema;
mod store;
mod types;

pub use schema::{Database, DEFAULT_STORAGE_TIMEOUT};
pub use store::ArticleStore;
pub use types::{Article, ArticlePage, LoadSummary, NewArticle, StorageError};
