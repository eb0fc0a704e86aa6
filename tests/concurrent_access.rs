//! Readers and the ingestion writer sharing one file-backed WAL database.
//!
//! `:memory:` databases never enter WAL mode, so these tests open a real file
//! in a temporary directory.

use newsflow::config::Config;
use newsflow::feed::HttpFeedSource;
use newsflow::pipeline::Pipeline;
use newsflow::query::{list_articles, ListArticlesParams};
use newsflow::storage::{Database, NewArticle};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRELOADED: usize = 20;
const FEED_SIZE: usize = 300;

fn preloaded_article(i: usize) -> NewArticle {
    NewArticle {
        title: format!("Archive {i}"),
        author: "Desk".to_string(),
        description: "Older coverage".to_string(),
        url: format!("https://archive.example.com/{i}"),
        image_url: String::new(),
        source: "Wire".to_string(),
        category: "general".to_string(),
        language: "en".to_string(),
        country: "us".to_string(),
        published_at: None,
    }
}

fn large_feed() -> Value {
    let entries: Vec<Value> = (0..FEED_SIZE)
        .map(|i| {
            json!({
                "title": format!("Breaking {i}"),
                "description": "Fresh coverage",
                "url": format!("https://news.example.com/{i}"),
                "category": "general",
                "language": "en",
                "published_at": "2024-06-26T08:00:00Z"
            })
        })
        .collect();
    Value::Array(entries)
}

/// File database in a fresh temp dir, schema created and partly filled
async fn file_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("news.db");
    let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
    db.ensure_schema().await.unwrap();
    let articles: Vec<NewArticle> = (0..PRELOADED).map(preloaded_article).collect();
    db.upsert_articles(&articles).await.unwrap();
    (dir, db)
}

async fn feed_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/news"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": large_feed()})))
        .mount(&server)
        .await;
    server
}

fn source_for(server: &MockServer) -> HttpFeedSource {
    let config = Config {
        feed_endpoint: format!("{}/v1/news", server.uri()),
        access_key: Some("concurrency-key".to_string()),
        ..Config::default()
    };
    HttpFeedSource::from_config(reqwest::Client::new(), &config).unwrap()
}

fn page_params(skip: i64) -> ListArticlesParams {
    ListArticlesParams {
        skip: Some(skip),
        limit: Some(10),
        sort_by: Some("title".to_string()),
        ..ListArticlesParams::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_queries_succeed_while_ingestion_writes() {
    let (dir, db) = file_db().await;
    let server = feed_server().await;
    let pipeline = Pipeline::new(source_for(&server), db.clone());

    let (report, first, second, third, fourth) = tokio::join!(
        pipeline.run(),
        list_articles(&db, page_params(0)),
        list_articles(&db, page_params(3)),
        list_articles(&db, page_params(6)),
        list_articles(&db, page_params(10)),
    );

    let report = report.unwrap();
    assert_eq!(report.inserted, FEED_SIZE);

    let before = PRELOADED as i64;
    let after = (PRELOADED + FEED_SIZE) as i64;
    for page in [first, second, third, fourth] {
        let page = page.unwrap();
        // Each read sees the store either before or after the load commits
        assert!(
            page.total_items == before || page.total_items == after,
            "unexpected total {}",
            page.total_items
        );
        assert_eq!(page.data.len(), 10);
    }

    assert!(dir.path().join("news.db-wal").exists());
    assert_eq!(db.count_articles().await.unwrap(), after);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_see_committed_state_after_concurrent_run() {
    let (_dir, db) = file_db().await;
    let server = feed_server().await;
    let pipeline = Pipeline::new(source_for(&server), db.clone());

    let reader = async {
        let mut totals = Vec::new();
        for _ in 0..5 {
            let page = list_articles(&db, ListArticlesParams::default())
                .await
                .unwrap();
            totals.push(page.total_items);
            tokio::task::yield_now().await;
        }
        totals
    };
    let (report, totals) = tokio::join!(pipeline.run(), reader);
    report.unwrap();

    // Totals never go backwards and never show a half-written batch
    let before = PRELOADED as i64;
    let after = (PRELOADED + FEED_SIZE) as i64;
    assert!(totals.iter().all(|t| *t == before || *t == after));
    assert!(totals.windows(2).all(|w| w[0] <= w[1]));

    let page = list_articles(&db, ListArticlesParams::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, after);
}
