//! Integration tests for a full ingestion run: mocked feed endpoint, real
//! HTTP source, in-memory SQLite, then reading the result back through the
//! query API.
//!
//! Each test creates its own mock server and database for isolation.

use chrono::NaiveDate;
use newsflow::config::Config;
use newsflow::feed::{HttpFeedSource, UNKNOWN_AUTHOR};
use newsflow::pipeline::{IngestError, Pipeline};
use newsflow::query::{list_articles, ListArticlesParams};
use newsflow::storage::Database;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "integration-key";

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn source_for(server: &MockServer) -> HttpFeedSource {
    let config = Config {
        feed_endpoint: format!("{}/v1/news", server.uri()),
        access_key: Some(KEY.to_string()),
        ..Config::default()
    };
    HttpFeedSource::from_config(reqwest::Client::new(), &config).unwrap()
}

async fn mount_feed(server: &MockServer, data: Value) {
    Mock::given(method("GET"))
        .and(path("/v1/news"))
        .and(query_param("access_key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pagination": {"limit": 25, "offset": 0},
            "data": data,
        })))
        .mount(server)
        .await;
}

fn sample_feed() -> Value {
    json!([
        {
            "author": "A. Writer",
            "title": "Markets rally",
            "description": "Stocks rose sharply",
            "url": "https://news.example.com/markets",
            "source": "Wire",
            "image": "https://news.example.com/markets.jpg",
            "category": "business",
            "language": "en",
            "country": "us",
            "published_at": "2024-06-26T09:15:00+00:00"
        },
        {
            "author": null,
            "title": "Cup final tonight",
            "description": null,
            "url": "https://news.example.com/final",
            "source": "Sports Desk",
            "image": null,
            "category": "sports",
            "language": "en",
            "country": "gb",
            "published_at": "2024-06-25T18:00:00Z"
        },
        {
            "title": "Undated feature",
            "url": "https://news.example.com/feature",
            "category": "general",
            "language": "de",
            "published_at": "sometime"
        }
    ])
}

// ============================================================================
// Round Trip
// ============================================================================

#[tokio::test]
async fn test_ingest_then_list_round_trip() {
    let server = MockServer::start().await;
    mount_feed(&server, sample_feed()).await;
    let db = test_db().await;

    let report = Pipeline::new(source_for(&server), db.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.date_warnings, 1);

    let page = list_articles(&db, ListArticlesParams::default()).await.unwrap();
    assert_eq!(page.total_items, 3);
    let titles: Vec<&str> = page.data.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Markets rally", "Cup final tonight", "Undated feature"]
    );

    let markets = &page.data[0];
    assert_eq!(markets.author, "A. Writer");
    assert_eq!(markets.image_url, "https://news.example.com/markets.jpg");
    assert_eq!(markets.published_at, NaiveDate::from_ymd_opt(2024, 6, 26));

    let final_match = &page.data[1];
    assert_eq!(final_match.author, UNKNOWN_AUTHOR);
    assert_eq!(final_match.description, "");
    assert_eq!(final_match.image_url, "");

    assert_eq!(page.data[2].published_at, None);
}

#[tokio::test]
async fn test_ingest_filters_by_date_after_load() {
    let server = MockServer::start().await;
    mount_feed(&server, sample_feed()).await;
    let db = test_db().await;
    Pipeline::new(source_for(&server), db.clone())
        .run()
        .await
        .unwrap();

    let params: ListArticlesParams =
        serde_json::from_value(json!({"publication_date": "2024-06-25"})).unwrap();
    let page = list_articles(&db, params).await.unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.data[0].url, "https://news.example.com/final");
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_ingest_twice_same_state() {
    let server = MockServer::start().await;
    mount_feed(&server, sample_feed()).await;
    let db = test_db().await;
    let pipeline = Pipeline::new(source_for(&server), db.clone());

    pipeline.run().await.unwrap();
    let before = list_articles(&db, ListArticlesParams::default()).await.unwrap();

    let second = pipeline.run().await.unwrap();
    let after = list_articles(&db, ListArticlesParams::default()).await.unwrap();

    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 3);
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_reingest_overwrites_changed_content() {
    let db = test_db().await;

    let first = MockServer::start().await;
    mount_feed(
        &first,
        json!([{"title": "Draft headline", "url": "https://news.example.com/x"}]),
    )
    .await;
    Pipeline::new(source_for(&first), db.clone())
        .run()
        .await
        .unwrap();

    let second = MockServer::start().await;
    mount_feed(
        &second,
        json!([{"title": "Final headline", "url": "https://news.example.com/x"}]),
    )
    .await;
    Pipeline::new(source_for(&second), db.clone())
        .run()
        .await
        .unwrap();

    let page = list_articles(&db, ListArticlesParams::default()).await.unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.data[0].id, 1);
    assert_eq!(page.data[0].title, "Final headline");
}

#[tokio::test]
async fn test_ingest_duplicate_urls_stored_once() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        json!([
            {"title": "One", "url": "https://news.example.com/same"},
            {"title": "Two", "url": "https://news.example.com/same"},
            {"title": "Three", "url": "https://news.example.com/other"}
        ]),
    )
    .await;
    let db = test_db().await;

    let report = Pipeline::new(source_for(&server), db.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(report.duplicates_in_batch, 1);
    assert_eq!(db.count_articles().await.unwrap(), 2);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_ingest_empty_feed() {
    let server = MockServer::start().await;
    mount_feed(&server, json!([])).await;
    let db = test_db().await;

    let report = Pipeline::new(source_for(&server), db.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(report.fetched, 0);
    assert_eq!(db.count_articles().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ingest_upstream_failure_leaves_store_untouched() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        json!([{"title": "Kept", "url": "https://news.example.com/kept"}]),
    )
    .await;
    let db = test_db().await;
    Pipeline::new(source_for(&server), db.clone())
        .run()
        .await
        .unwrap();

    let failing = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&failing)
        .await;

    let err = Pipeline::new(source_for(&failing), db.clone())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Fetch(_)));
    assert!(err.is_transient());
    assert_eq!(db.count_articles().await.unwrap(), 1);
}

#[tokio::test]
async fn test_minimal_entry_scenario() {
    let server = MockServer::start().await;
    mount_feed(&server, json!([{"title": "A", "url": "http://x/1"}])).await;
    let db = test_db().await;

    Pipeline::new(source_for(&server), db.clone())
        .run()
        .await
        .unwrap();

    let page = list_articles(&db, ListArticlesParams::default()).await.unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.data[0].author, "Unknown");
    assert_eq!(page.data[0].published_at, None);
}

#[tokio::test]
async fn test_loaded_article_found_by_its_own_attributes() {
    let server = MockServer::start().await;
    mount_feed(&server, sample_feed()).await;
    let db = test_db().await;
    Pipeline::new(source_for(&server), db.clone())
        .run()
        .await
        .unwrap();

    let page = list_articles(
        &db,
        ListArticlesParams {
            category: Some("business".to_string()),
            language: Some("en".to_string()),
            published_at: NaiveDate::from_ymd_opt(2024, 6, 26),
            ..ListArticlesParams::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.data[0].url, "https://news.example.com/markets");
}
