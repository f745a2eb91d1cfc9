//! Extractor integration tests
//!
//! Both source endpoints are served by a local wiremock server; landing goes
//! to the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use firmo_common::Dataset;
use firmo_pipeline::error::PipelineError;
use firmo_pipeline::extract::{http_client, land, RankingExtractor, WebTableExtractor};
use firmo_pipeline::storage::MemoryStore;
use serde_json::Value;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PREFIX: &str = "firmographics/raw/";
const SP500_PAGE: &str = include_str!("fixtures/sp500_page.html");

const RANKING_BODY: &str = r#"{"items":[{"rank":1,"name":"Walmart","revenues":680985},{"rank":2,"name":"Amazon","revenues":637959}],"year":2025}"#;

fn fortune() -> Dataset {
    Dataset::new("fortune500", "fortune500_2025.json", "fortune_500")
}

fn sp500() -> Dataset {
    Dataset::new("wikipedia_sp500", "sp500.json", "wiki_sp500")
}

async fn ranking_server(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/getRankingSearchYear/fortune500/2025/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;
    server
}

async fn web_table_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wiki/List_of_S%26P_500_companies"))
        .and(header("user-agent", "Mozilla/5.0"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SP500_PAGE, "text/html"))
        .mount(&server)
        .await;
    server
}

fn ranking_extractor(server: &MockServer) -> RankingExtractor {
    RankingExtractor::new(
        http_client(None).unwrap(),
        format!("{}/api/getRankingSearchYear/fortune500/2025/", server.uri()),
        fortune(),
    )
}

fn web_table_extractor(server: &MockServer) -> WebTableExtractor {
    WebTableExtractor::new(
        http_client(None).unwrap(),
        format!("{}/wiki/List_of_S%26P_500_companies", server.uri()),
        "Mozilla/5.0",
        1,
        sp500(),
    )
}

#[tokio::test]
async fn test_ranking_lands_exact_body() {
    let server = ranking_server(RANKING_BODY).await;
    let store = MemoryStore::new("firmographics-landing-2025");

    let result = land(&ranking_extractor(&server), &store, PREFIX).await.unwrap();

    assert_eq!(result.key, "firmographics/raw/fortune500_2025.json");
    let object = store.object(&result.key).unwrap();
    assert_eq!(object.data, RANKING_BODY.as_bytes());
    assert_eq!(object.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_ranking_error_status_lands_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let store = MemoryStore::new("landing");

    let err = land(&ranking_extractor(&server), &store, PREFIX).await.unwrap_err();

    assert!(matches!(err, PipelineError::Fetch { status: 503, .. }));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_ranking_non_json_body_is_rejected() {
    let server = ranking_server("<html>maintenance</html>").await;
    let store = MemoryStore::new("landing");

    let err = land(&ranking_extractor(&server), &store, PREFIX).await.unwrap_err();

    assert!(matches!(err, PipelineError::Parse(_)));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_web_table_records_follow_header() {
    let server = web_table_server().await;
    let store = MemoryStore::new("landing");

    let result = land(&web_table_extractor(&server), &store, PREFIX).await.unwrap();
    assert_eq!(result.key, "firmographics/raw/sp500.json");

    let landed: Value = serde_json::from_slice(&store.object(&result.key).unwrap().data).unwrap();
    let records = landed.as_array().unwrap();
    assert_eq!(records.len(), 5);

    let header = [
        "Symbol",
        "Security",
        "GICS Sector",
        "GICS Sub-Industry",
        "Headquarters Location",
        "Date added",
        "CIK",
        "Founded",
    ];
    for record in records {
        let fields: Vec<&str> = record.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(fields, header);
    }

    assert_eq!(records[0]["Symbol"], "MMM");
    // One non-numeric year keeps the whole column as text.
    assert_eq!(records[0]["Founded"], "1902");
    assert_eq!(records[4]["Founded"], "1839 (1955)");
    assert_eq!(records[0]["CIK"], 66740);
    assert_eq!(records[3]["GICS Sub-Industry"], "Hotels, Resorts & Cruise Lines");
    assert_eq!(records[4]["Symbol"], "BRK.B");
}

#[tokio::test]
async fn test_web_table_missing_index_is_parse_error() {
    let server = web_table_server().await;
    let extractor = WebTableExtractor::new(
        http_client(None).unwrap(),
        format!("{}/wiki/List_of_S%26P_500_companies", server.uri()),
        "Mozilla/5.0",
        7,
        sp500(),
    );
    let store = MemoryStore::new("landing");

    let err = land(&extractor, &store, PREFIX).await.unwrap_err();
    assert!(matches!(err, PipelineError::Parse(_)));
}

#[tokio::test]
async fn test_extracting_twice_keeps_one_object() {
    let ranking = ranking_server(RANKING_BODY).await;
    let pages = web_table_server().await;
    let store = MemoryStore::new("landing");

    for _ in 0..2 {
        land(&ranking_extractor(&ranking), &store, PREFIX).await.unwrap();
        land(&web_table_extractor(&pages), &store, PREFIX).await.unwrap();
    }

    assert_eq!(
        store.keys(),
        vec!["firmographics/raw/fortune500_2025.json", "firmographics/raw/sp500.json"]
    );
}

#[tokio::test]
async fn test_second_extract_replaces_first() {
    let store = MemoryStore::new("landing");

    let first = ranking_server(r#"{"year":2024}"#).await;
    land(&ranking_extractor(&first), &store, PREFIX).await.unwrap();

    let second = ranking_server(RANKING_BODY).await;
    land(&ranking_extractor(&second), &store, PREFIX).await.unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(
        store.object("firmographics/raw/fortune500_2025.json").unwrap().data,
        RANKING_BODY.as_bytes()
    );
}
