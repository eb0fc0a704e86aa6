use sqlx::{QueryBuilder, Sqlite};

use super::articles::fold_case;
use super::schema::Database;
use super::types::{Article, ArticlePage, StorageError};
use crate::query::{QuerySpec, Sort};

// ============================================================================
// QuerySpec Translation
// ============================================================================

const SELECT_ARTICLES: &str = "SELECT id, title, author, description, url, image_url, \
     source, category, language, country, published_at FROM news_articles";

const SELECT_COUNT: &str = "SELECT COUNT(*) FROM news_articles";

/// Build the total-count statement for a spec: same filters as the page,
/// no ordering or paging.
pub(crate) fn count_query(spec: &QuerySpec) -> QueryBuilder<'_, Sqlite> {
    let mut builder = QueryBuilder::new(SELECT_COUNT);
    push_filters(&mut builder, spec);
    builder
}

/// Build the page statement for a spec: filters, resolved order, then
/// `LIMIT`/`OFFSET`.
pub(crate) fn page_query(spec: &QuerySpec) -> QueryBuilder<'_, Sqlite> {
    let mut builder = QueryBuilder::new(SELECT_ARTICLES);
    push_filters(&mut builder, spec);
    push_order(&mut builder, spec.sort());
    builder.push(" LIMIT ");
    builder.push_bind(spec.limit());
    builder.push(" OFFSET ");
    builder.push_bind(spec.skip());
    builder
}

/// Append the WHERE clause. Every user value is a bound parameter.
fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, spec: &'a QuerySpec) {
    let mut keyword = " WHERE ";

    if let Some(category) = spec.category() {
        builder.push(keyword).push("category = ").push_bind(category);
        keyword = " AND ";
    }
    if let Some(language) = spec.language() {
        builder.push(keyword).push("language = ").push_bind(language);
        keyword = " AND ";
    }
    if let Some(date) = spec.published_at() {
        builder.push(keyword).push("published_at = ").push_bind(date);
        keyword = " AND ";
    }
    if let Some(search) = spec.search() {
        // Matched against the folded columns written at load time
        let pattern = like_pattern(&fold_case(search));
        builder
            .push(keyword)
            .push("(title_folded LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR description_folded LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// Append ORDER BY. The column comes from the allow-listed enum, never from
/// input. Undated rows sort last in either direction and `id` breaks ties so
/// paging is stable across calls.
fn push_order(builder: &mut QueryBuilder<'_, Sqlite>, sort: Sort) {
    builder
        .push(" ORDER BY ")
        .push(sort.key.column())
        .push(" ")
        .push(sort.order.as_sql())
        .push(" NULLS LAST, id ASC");
}

/// Wrap a search term for a literal substring LIKE match
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl Database {
    // ========================================================================
    // Query Operations
    // ========================================================================

    /// Run a spec: total matching rows plus the requested page.
    ///
    /// Both statements run inside one read transaction so the count and the
    /// page describe the same snapshot even while an ingestion run commits.
    pub async fn query_articles(&self, spec: &QuerySpec) -> Result<ArticlePage, StorageError> {
        self.bounded(async {
            let mut tx = self.pool.begin().await?;

            let mut count = count_query(spec);
            let (total_items,): (i64,) = count.build_query_as().fetch_one(&mut *tx).await?;

            let data: Vec<Article> = if total_items > spec.skip() {
                let mut page = page_query(spec);
                page.build_query_as().fetch_all(&mut *tx).await?
            } else {
                Vec::new()
            };

            tx.commit().await?;

            tracing::debug!(
                total = total_items,
                returned = data.len(),
                skip = spec.skip(),
                limit = spec.limit(),
                "query_articles"
            );
            Ok::<_, StorageError>(ArticlePage { total_items, data })
        })
        .await
    }
}
