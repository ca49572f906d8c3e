use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use shelf_server::error::UNAUTHORIZED_MESSAGE;
use shelf_server::{AppState, build_app};
use shelf_store::ArticleStore;
use shelf_web::{FetchError, PageFetcher};
use tower::ServiceExt;
use url::Url;

const API_KEY: &str = "test-key";

const PAGE: &str = r#"<html><head>
  <title>Saved for later</title>
  <meta name="description" content="A page worth reading.">
  <meta property="og:image" content="/cover.png">
  <link rel="icon" href="/favicon.ico">
</head></html>"#;

enum Stub {
    Html(&'static str),
    Fail(fn() -> FetchError),
}

#[async_trait]
impl PageFetcher for Stub {
    async fn fetch(&self, _url: &Url) -> Result<String, FetchError> {
        match self {
            Stub::Html(html) => Ok(html.to_string()),
            Stub::Fail(make) => Err(make()),
        }
    }
}

async fn app_with(fetcher: Stub) -> (Router, ArticleStore) {
    let store = ArticleStore::in_memory().await.unwrap();
    let state = AppState::new(store.clone(), Arc::new(fetcher), API_KEY);
    (build_app(state), store)
}

fn submit(url: &str, key: Option<&str>) -> Request<Body> {
    let mut req = Request::post("/api/articles")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(key) = key {
        req = req.header("X-API-KEY", key);
    }
    let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
    let body = format!("url={encoded}");
    req.body(Body::from(body)).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn submitting_requires_the_api_key() {
    let (app, store) = app_with(Stub::Html(PAGE)).await;

    let (status, body) = send(&app, submit("https://example.com/a", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], UNAUTHORIZED_MESSAGE);

    let (status, _) = send(&app, submit("https://example.com/a", Some("wrong-key"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn listing_needs_no_key() {
    let (app, _) = app_with(Stub::Html(PAGE)).await;
    let (status, body) = send(&app, get("/api/articles?page=0&limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Array(vec![]));
}

#[tokio::test]
async fn submitted_article_is_summarized_and_stored() {
    let (app, store) = app_with(Stub::Html(PAGE)).await;

    let (status, body) = send(&app, submit("https://example.com/post/1", Some(API_KEY))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["url"], "https://example.com/post/1");
    assert_eq!(body["title"], "Saved for later");
    assert_eq!(body["description"], "A page worth reading.");
    assert_eq!(body["image"], "https://example.com/cover.png");
    assert_eq!(body["favicon"], "https://example.com/favicon.ico");
    assert!(body["id"].as_i64().unwrap() > 0);
    assert!(body["createdAt"].is_string());

    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn invalid_urls_are_rejected_before_fetching() {
    let (app, store) = app_with(Stub::Fail(|| {
        FetchError::Network("must not be called".into())
    }))
    .await;

    for bad in ["", "not a url", "ftp://example.com/file", "example.com/post"] {
        let (status, body) = send(&app, submit(bad, Some(API_KEY))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "input {bad:?}");
        assert!(body["error"].is_string());
    }

    let missing_field = Request::post("/api/articles")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("X-API-KEY", API_KEY)
        .body(Body::from("link=https://example.com"))
        .unwrap();
    let (status, _) = send(&app, missing_field).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn fetch_failure_is_bad_gateway_and_stores_nothing() {
    let (app, store) = app_with(Stub::Fail(|| {
        FetchError::Network("connection refused".into())
    }))
    .await;

    let (status, body) = send(&app, submit("https://example.com/down", Some(API_KEY))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn fetch_timeout_is_gateway_timeout() {
    let (app, store) = app_with(Stub::Fail(|| FetchError::Timeout(Duration::from_secs(10)))).await;

    let (status, _) = send(&app, submit("https://example.com/slow", Some(API_KEY))).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn list_validates_pagination() {
    let (app, _) = app_with(Stub::Html(PAGE)).await;

    for uri in [
        "/api/articles",
        "/api/articles?page=0",
        "/api/articles?page=0&limit=0",
        "/api/articles?page=0&limit=101",
        "/api/articles?page=-1&limit=10",
        "/api/articles?page=zero&limit=10",
    ] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri {uri}");
        assert!(body["error"].is_string(), "uri {uri}");
    }
}

#[tokio::test]
async fn list_pages_newest_first() {
    let (app, _) = app_with(Stub::Html(PAGE)).await;
    for i in 0..3 {
        let url = format!("https://example.com/post/{i}");
        let (status, _) = send(&app, submit(&url, Some(API_KEY))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, get("/api/articles?page=0&limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    let urls: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["url"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(urls, ["https://example.com/post/2", "https://example.com/post/1"]);

    let (_, body) = send(&app, get("/api/articles?page=1&limit=2")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["url"], "https://example.com/post/0");

    let (_, body) = send(&app, get("/api/articles?page=5&limit=2")).await;
    assert_eq!(body, Value::Array(vec![]));
}

#[tokio::test]
async fn health_reports_database_state() {
    let (app, store) = app_with(Stub::Html(PAGE)).await;

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");

    store.pool().close().await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], "error");
}
