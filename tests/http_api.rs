//! HTTP API Tests
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`:
//! - Post creation and deletion status codes
//! - Authentication on write routes
//! - Live streams answer 404 for unknown resources and push refreshes

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::time::{sleep, timeout};
use tower::ServiceExt;

use feedline::cli::bootstrap;
use feedline::config::{AuthConfig, Config, MessagingConfig};
use feedline::feed_store::FeedStore;
use feedline::http_server::{AppState, HttpServer};
use feedline::post_store::PostStore;
use feedline::router::RouterState;

// =============================================================================
// Test Utilities
// =============================================================================

async fn app_with(config: Config) -> (Router, AppState) {
    let state = bootstrap(&config).await.unwrap();
    state.router.start().await.unwrap();
    let app = HttpServer::new(config.http.clone(), state.clone()).router();
    (app, state)
}

async fn app() -> (Router, AppState) {
    app_with(Config::default()).await
}

fn create_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/tweets")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Wait until the fan-out handlers have materialized `name`
async fn wait_for_feed(feeds: &Arc<dyn FeedStore>, name: &str, len: usize) {
    for _ in 0..100 {
        if let Some(feed) = feeds.get_feed(name).await.unwrap() {
            if feed.len() == len {
                return;
            }
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("feed {} never reached {} posts", name, len);
}

/// Next SSE frame as text
async fn next_frame(stream: &mut axum::body::BodyDataStream) -> String {
    loop {
        let chunk = timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("timed out waiting for SSE frame")
            .expect("SSE stream ended")
            .unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        // Skip keep-alive comments
        if !text.starts_with(':') {
            return text;
        }
    }
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_reports_router_state() {
    let (app, state) = app().await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["router"], "running");

    state.router.shutdown().await.unwrap();
    assert_eq!(state.router.state(), RouterState::Stopped);
}

#[tokio::test]
async fn test_health_ok_with_messaging_disabled() {
    let config = Config {
        messaging: MessagingConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let (app, state) = app_with(config).await;
    assert_eq!(state.router.transport().name(), "null");
    sleep(Duration::from_millis(50)).await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["router"], "running");

    state.router.shutdown().await.unwrap();
    assert_eq!(state.router.state(), RouterState::Stopped);
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn test_create_post() {
    let (app, state) = app().await;

    let response = app
        .oneshot(create_request(json!({
            "title": "Hello",
            "content": "First post",
            "tags": ["tech", "news", "tech"]
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let post = json_body(response).await;
    assert_eq!(post["author"], "anonymous");
    assert_eq!(post["tags"], json!(["tech", "news"]));
    assert!(!post["id"].as_str().unwrap().is_empty());

    wait_for_feed(&state.feeds, "tech", 1).await;
    wait_for_feed(&state.feeds, "news", 1).await;
    state.router.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_create_rejects_malformed_body() {
    let (app, state) = app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/tweets")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    state.router.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_create_requires_token_when_auth_enabled() {
    let config = Config {
        auth: AuthConfig {
            enable: true,
            jwt_secret: Some("integration-secret".to_string()),
            issuer: None,
            audience: None,
        },
        ..Default::default()
    };
    let (app, state) = app_with(config).await;

    let response = app
        .oneshot(create_request(json!({"title": "x", "tags": ["tech"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(state.posts.list_posts().await.unwrap().is_empty());

    state.router.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_delete_unknown_post_is_404() {
    let (app, state) = app().await;

    let response = app.oneshot(delete("/api/tweets/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    state.router.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_delete_post_empties_feeds() {
    let (app, state) = app().await;

    let response = app
        .clone()
        .oneshot(create_request(json!({"title": "Bye", "tags": ["tech"]})))
        .await
        .unwrap();
    let post = json_body(response).await;
    let id = post["id"].as_str().unwrap().to_string();
    wait_for_feed(&state.feeds, "tech", 1).await;

    let response = app
        .oneshot(delete(&format!("/api/tweets/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    wait_for_feed(&state.feeds, "tech", 0).await;
    assert!(state.posts.get_post(&id).await.unwrap().is_none());

    state.router.shutdown().await.unwrap();
}

// =============================================================================
// Live Streams
// =============================================================================

#[tokio::test]
async fn test_unknown_feed_is_404() {
    let (app, state) = app().await;

    let response = app.oneshot(get("/api/feeds/nothing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Not found");

    state.router.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_feed_stream_pushes_refresh() {
    let (app, state) = app().await;
    state.feeds.ensure_feed("tech").await.unwrap();

    let response = app.clone().oneshot(get("/api/feeds/tech")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    let mut frames = response.into_body().into_data_stream();

    let initial = next_frame(&mut frames).await;
    assert!(initial.starts_with("data: "));
    assert!(initial.contains(r#""name":"tech""#));

    let response = app
        .oneshot(create_request(json!({"title": "Streamed", "tags": ["tech"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let refreshed = next_frame(&mut frames).await;
    assert!(refreshed.contains("Streamed"));

    state.router.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_all_feeds_stream_lists_summaries() {
    let (app, state) = app().await;
    state.feeds.ensure_feed("tech").await.unwrap();

    let response = app.oneshot(get("/api/feeds")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut frames = response.into_body().into_data_stream();

    let initial = next_frame(&mut frames).await;
    assert!(initial.contains(r#""feeds""#));
    assert!(initial.contains(r#""name":"tech""#));

    state.router.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_post_stream_ends_on_delete() {
    let (app, state) = app().await;

    let response = app
        .clone()
        .oneshot(create_request(json!({"title": "Ephemeral", "tags": []})))
        .await
        .unwrap();
    let post = json_body(response).await;
    let id = post["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/tweets/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut frames = response.into_body().into_data_stream();
    assert!(next_frame(&mut frames).await.contains("Ephemeral"));

    let response = app
        .oneshot(delete(&format!("/api/tweets/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let removed = next_frame(&mut frames).await;
    assert!(removed.contains("event: removed"));

    state.router.shutdown().await.unwrap();
}
