use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashMap;

use super::schema::Database;
use super::types::{Article, LoadSummary, NewArticle, StorageError};

/// Rows per multi-row statement. 12 columns * 50 rows = 600 bound parameters,
/// under SQLite's 999 parameter limit.
const BATCH_SIZE: usize = 50;

const INSERT_IGNORE: &str = "INSERT OR IGNORE INTO news_articles \
     (title, author, description, url, image_url, source, category, language, country, published_at, \
     title_folded, description_folded) ";

const INSERT_UPSERT: &str = "INSERT INTO news_articles \
     (title, author, description, url, image_url, source, category, language, country, published_at, \
     title_folded, description_folded) ";

impl Database {
    // ========================================================================
    // Article Loading
    // ========================================================================

    /// Upsert a batch of articles keyed by `url`.
    ///
    /// Existing rows are overwritten with the incoming values (their `id` is
    /// kept); new URLs are inserted. Entries sharing a `url` inside the batch
    /// collapse to the last one. The whole batch runs in one transaction, so a
    /// failed or cancelled load leaves no partial rows behind.
    ///
    /// Uses two passes per chunk: `INSERT OR IGNORE` to count genuinely new
    /// rows from `rows_affected()`, then `INSERT ... ON CONFLICT(url) DO UPDATE`
    /// to refresh the rows that already existed.
    pub async fn upsert_articles(&self, articles: &[NewArticle]) -> Result<LoadSummary, StorageError> {
        if articles.is_empty() {
            return Ok(LoadSummary::default());
        }

        let unique = dedup_by_url(articles);
        let duplicates_in_batch = articles.len() - unique.len();
        if duplicates_in_batch > 0 {
            tracing::debug!(
                duplicates = duplicates_in_batch,
                "Collapsed duplicate URLs within batch"
            );
        }

        self.bounded(async {
            let mut tx = self.pool.begin().await?;
            let mut inserted: usize = 0;

            for chunk in unique.chunks(BATCH_SIZE) {
                let mut insert_builder: QueryBuilder<Sqlite> =
                    QueryBuilder::new(INSERT_IGNORE);
                push_article_values(&mut insert_builder, chunk);
                let result = insert_builder.build().execute(&mut *tx).await?;
                inserted += result.rows_affected() as usize;

                let mut upsert_builder: QueryBuilder<Sqlite> = QueryBuilder::new(INSERT_UPSERT);
                push_article_values(&mut upsert_builder, chunk);
                upsert_builder.push(
                    " ON CONFLICT(url) DO UPDATE SET \
                     title = excluded.title, \
                     author = excluded.author, \
                     description = excluded.description, \
                     image_url = excluded.image_url, \
                     source = excluded.source, \
                     category = excluded.category, \
                     language = excluded.language, \
                     country = excluded.country, \
                     published_at = excluded.published_at, \
                     title_folded = excluded.title_folded, \
                     description_folded = excluded.description_folded",
                );
                upsert_builder.build().execute(&mut *tx).await?;
            }

            tx.commit().await?;

            Ok::<_, StorageError>(LoadSummary {
                inserted,
                updated: unique.len() - inserted,
                duplicates_in_batch,
            })
        })
        .await
    }

    // ========================================================================
    // Article Lookups
    // ========================================================================

    /// Get a single article by its ID
    pub async fn get_article(&self, article_id: i64) -> Result<Option<Article>, StorageError> {
        self.bounded(async {
            let row = sqlx::query_as::<_, Article>(
                r#"
                SELECT id, title, author, description, url, image_url,
                       source, category, language, country, published_at
                FROM news_articles
                WHERE id = ?
            "#,
            )
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, StorageError>(row)
        })
        .await
    }

    /// Total number of stored articles
    pub async fn count_articles(&self) -> Result<i64, StorageError> {
        self.bounded(async {
            let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM news_articles")
                .fetch_one(&self.pool)
                .await?;
            Ok::<_, StorageError>(count.0)
        })
        .await
    }
}

/// Keep one entry per URL: the last value wins, at the position where the URL
/// first appeared, so feed order is preserved for insertion ids.
fn dedup_by_url(articles: &[NewArticle]) -> Vec<&NewArticle> {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(articles.len());
    let mut unique: Vec<&NewArticle> = Vec::with_capacity(articles.len());

    for article in articles {
        match positions.get(article.url.as_str()) {
            Some(&idx) => unique[idx] = article,
            None => {
                positions.insert(article.url.as_str(), unique.len());
                unique.push(article);
            }
        }
    }

    unique
}

/// Bind one row per article. The folded copies of title and description back
/// the case-insensitive search, since SQLite's own `LIKE` folds ASCII only.
fn push_article_values<'a>(builder: &mut QueryBuilder<'a, Sqlite>, chunk: &[&'a NewArticle]) {
    builder.push_values(chunk.iter().copied(), |mut b, article| {
        b.push_bind(&article.title)
            .push_bind(&article.author)
            .push_bind(&article.description)
            .push_bind(&article.url)
            .push_bind(&article.image_url)
            .push_bind(&article.source)
            .push_bind(&article.category)
            .push_bind(&article.language)
            .push_bind(&article.country)
            .push_bind(article.published_at)
            .push_bind(fold_case(&article.title))
            .push_bind(fold_case(&article.description));
    });
}

/// Unicode lowercase, shared by the load path and search patterns
pub(crate) fn fold_case(text: &str) -> String {
    text.to_lowercase()
}
