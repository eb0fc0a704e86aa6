//! Read-side request model: the list-articles parameters, their resolution
//! into an immutable [`QuerySpec`], and the single `list_articles` operation.
//!
//! Resolution never fails. Out-of-range paging values are clamped, unknown
//! sort fields fall back to newest-first, and blank filters are dropped, so
//! every request maps to a bounded, well-formed query.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::storage::{ArticlePage, ArticleStore, StorageError};

/// Page size used when the caller does not ask for one
pub const DEFAULT_LIMIT: i64 = 10;

/// Hard cap on rows returned per page, regardless of the request
pub const MAX_LIMIT: i64 = 100;

// ============================================================================
// Sorting
// ============================================================================

/// Allow-listed sort fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Date,
    Title,
    Category,
}

impl SortKey {
    /// Resolve a user-facing sort name. Anything outside the allow-list is `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "date" => Some(SortKey::Date),
            "title" => Some(SortKey::Title),
            "category" => Some(SortKey::Category),
            _ => None,
        }
    }

    /// Column the key sorts on
    pub fn column(self) -> &'static str {
        match self {
            SortKey::Date => "published_at",
            SortKey::Title => "title",
            SortKey::Category => "category",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// `asc` (any case) is ascending; everything else is descending
    pub fn parse(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Default for Sort {
    /// Newest first
    fn default() -> Self {
        Self {
            key: SortKey::Date,
            order: SortOrder::Desc,
        }
    }
}

impl Sort {
    /// Resolve raw sort parameters.
    ///
    /// - no `sort_by` → sort by date in the requested order
    /// - `sort_by` outside the allow-list → the default order, `sort_order` ignored
    /// - `sort_order` other than `asc` → descending
    pub fn resolve(sort_by: Option<&str>, sort_order: Option<&str>) -> Self {
        let order = sort_order.map(SortOrder::parse).unwrap_or(SortOrder::Desc);
        match sort_by {
            None => Self {
                key: SortKey::Date,
                order,
            },
            Some(name) => match SortKey::parse(name) {
                Some(key) => Self { key, order },
                None => {
                    tracing::debug!(sort_by = %name, "Unknown sort field, using default order");
                    Self::default()
                }
            },
        }
    }
}

// ============================================================================
// Request Parameters
// ============================================================================

/// Raw list-articles parameters as a transport layer would receive them.
///
/// Every field is optional; [`QuerySpec::from_params`] applies defaults and
/// bounds. `publication_date` is accepted as an alias for `published_at`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListArticlesParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    #[serde(alias = "publication_date")]
    pub published_at: Option<NaiveDate>,
    pub search: Option<String>,
}

// ============================================================================
// Query Spec
// ============================================================================

/// Immutable, fully resolved description of one article query.
///
/// Construction clamps every value, so a `QuerySpec` always describes a
/// bounded read: `skip >= 0` and `1 <= limit <= MAX_LIMIT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    skip: i64,
    limit: i64,
    sort: Sort,
    category: Option<String>,
    language: Option<String>,
    published_at: Option<NaiveDate>,
    search: Option<String>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
            sort: Sort::default(),
            category: None,
            language: None,
            published_at: None,
            search: None,
        }
    }
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve raw request parameters into a spec
    pub fn from_params(params: ListArticlesParams) -> Self {
        let sort = Sort::resolve(params.sort_by.as_deref(), params.sort_order.as_deref());
        let mut spec = Self::new()
            .with_sort(sort)
            .with_category(params.category)
            .with_language(params.language)
            .with_published_at(params.published_at)
            .with_search(params.search);
        if let Some(skip) = params.skip {
            spec = spec.with_skip(skip);
        }
        if let Some(limit) = params.limit {
            spec = spec.with_limit(limit);
        }
        spec
    }

    /// Offset into the filtered, sorted result set. Negative values become 0.
    pub fn with_skip(mut self, skip: i64) -> Self {
        self.skip = skip.max(0);
        self
    }

    /// Page size, clamped to `1..=MAX_LIMIT`
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit.clamp(1, MAX_LIMIT);
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_category(mut self, category: impl Into<Option<String>>) -> Self {
        self.category = non_blank(category.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<Option<String>>) -> Self {
        self.language = non_blank(language.into());
        self
    }

    pub fn with_published_at(mut self, date: Option<NaiveDate>) -> Self {
        self.published_at = date;
        self
    }

    /// Substring matched case-insensitively against title or description
    pub fn with_search(mut self, search: impl Into<Option<String>>) -> Self {
        self.search = non_blank(search.into());
        self
    }

    pub fn skip(&self) -> i64 {
        self.skip
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn published_at(&self) -> Option<NaiveDate> {
        self.published_at
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }
}

/// Blank or whitespace-only values impose no constraint
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// List Articles
// ============================================================================

/// List articles for a read request.
///
/// No matches is an empty page, never an error; only storage failures surface.
pub async fn list_articles<S>(store: &S, params: ListArticlesParams) -> Result<ArticlePage, StorageError>
where
    S: ArticleStore + ?Sized,
{
    let spec = QuerySpec::from_params(params);
    tracing::debug!(
        skip = spec.skip(),
        limit = spec.limit(),
        sort = ?spec.sort(),
        "list_articles"
    );
    store.query_articles(&spec).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let spec = QuerySpec::from_params(ListArticlesParams::default());
        assert_eq!(spec.skip(), 0);
        assert_eq!(spec.limit(), DEFAULT_LIMIT);
        assert_eq!(spec.sort(), Sort::default());
        assert_eq!(spec.category(), None);
        assert_eq!(spec.search(), None);
    }

    #[test]
    fn test_limit_clamped() {
        assert_eq!(QuerySpec::new().with_limit(0).limit(), 1);
        assert_eq!(QuerySpec::new().with_limit(-5).limit(), 1);
        assert_eq!(QuerySpec::new().with_limit(1000).limit(), MAX_LIMIT);
        assert_eq!(QuerySpec::new().with_limit(25).limit(), 25);
    }

    #[test]
    fn test_negative_skip_clamped() {
        assert_eq!(QuerySpec::new().with_skip(-10).skip(), 0);
    }

    #[test]
    fn test_sort_resolution() {
        assert_eq!(
            Sort::resolve(Some("title"), Some("asc")),
            Sort {
                key: SortKey::Title,
                order: SortOrder::Asc
            }
        );
        assert_eq!(
            Sort::resolve(Some("Category"), None),
            Sort {
                key: SortKey::Category,
                order: SortOrder::Desc
            }
        );
        assert_eq!(
            Sort::resolve(None, Some("asc")),
            Sort {
                key: SortKey::Date,
                order: SortOrder::Asc
            }
        );
    }

    #[test]
    fn test_unknown_sort_field_falls_back_to_default() {
        assert_eq!(Sort::resolve(Some("id; DROP TABLE x"), Some("asc")), Sort::default());
        assert_eq!(Sort::resolve(Some("author"), None), Sort::default());
    }

    #[test]
    fn test_unknown_sort_order_is_desc() {
        assert_eq!(SortOrder::parse("sideways"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("ASC"), SortOrder::Asc);
    }

    #[test]
    fn test_blank_filters_dropped() {
        let spec = QuerySpec::from_params(ListArticlesParams {
            category: Some(String::new()),
            language: Some("  ".into()),
            search: Some("   ".into()),
            ..Default::default()
        });
        assert_eq!(spec.category(), None);
        assert_eq!(spec.language(), None);
        assert_eq!(spec.search(), None);
    }

    #[test]
    fn test_params_deserialize_with_alias() {
        let params: ListArticlesParams = serde_json::from_str(
            r#"{"skip": 5, "publication_date": "2024-06-26", "sort_by": "title"}"#,
        )
        .unwrap();
        assert_eq!(params.skip, Some(5));
        assert_eq!(params.published_at, NaiveDate::from_ymd_opt(2024, 6, 26));
        assert_eq!(params.sort_by.as_deref(), Some("title"));
        assert_eq!(params.limit, None);
    }

    proptest! {
        #[test]
        fn prop_paging_always_bounded(skip in any::<i64>(), limit in any::<i64>()) {
            let spec = QuerySpec::from_params(ListArticlesParams {
                skip: Some(skip),
                limit: Some(limit),
                ..Default::default()
            });
            prop_assert!(spec.skip() >= 0);
            prop_assert!(spec.limit() >= 1 && spec.limit() <= MAX_LIMIT);
        }

        #[test]
        fn prop_sort_resolution_never_panics(sort_by in ".*", sort_order in ".*") {
            let sort = Sort::resolve(Some(&sort_by), Some(&sort_order));
            prop_assert!(matches!(sort.key, SortKey::Date | SortKey::Title | SortKey::Category));
        }
    }
}
