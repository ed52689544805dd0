#![allow(dead_code)]

use std::sync::Arc;

use assert_matches::assert_matches;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chartgen_events::EventBus;
use chartgen_pipeline::{BatchConfig, BatchJobManager};
use chartgen_providers::mock::ScriptedProvider;
use chartgen_providers::{GenerationProvider, ProviderFallbackClient};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use chartgen_api::config::ServerConfig;
use chartgen_api::router::build_app_router;
use chartgen_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        process_wait_timeout_secs: 30,
    }
}

/// Build the full application router over a single scripted provider.
///
/// Returns the manager as well so tests can inspect jobs directly.
pub fn build_test_app_with(
    provider: Arc<ScriptedProvider>,
    batch_config: BatchConfig,
) -> (Router, Arc<BatchJobManager>) {
    build_test_app_with_config(provider, batch_config, test_config())
}

/// Same as [`build_test_app_with`] with an explicit server config.
pub fn build_test_app_with_config(
    provider: Arc<ScriptedProvider>,
    batch_config: BatchConfig,
    config: ServerConfig,
) -> (Router, Arc<BatchJobManager>) {
    let mut client = ProviderFallbackClient::new();
    client.add_provider(
        provider.name().to_string(),
        provider as Arc<dyn GenerationProvider>,
        true,
    );

    let event_bus = Arc::new(EventBus::default());
    let manager = Arc::new(BatchJobManager::new(
        Arc::new(client),
        Arc::clone(&event_bus),
        batch_config,
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        manager: Arc::clone(&manager),
        event_bus,
    };

    (build_app_router(state, &config), manager)
}

/// Router over a provider that always succeeds, with default batch limits.
pub fn build_test_app() -> Router {
    build_test_app_with(
        Arc::new(ScriptedProvider::succeeding("scripted")),
        BatchConfig::default(),
    )
    .0
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is not valid JSON")
}

/// Assert the standard `{ "error": ..., "code": ... }` error body.
pub fn assert_error_code(body: &Value, code: &str) {
    assert_matches!(
        body,
        Value::Object(map)
            if map.get("code").is_some_and(|c| c == code)
                && map.get("error").is_some_and(Value::is_string),
        "expected error code {code}, got {body}"
    );
}

/// Send a GET request and return `(status, json body)`.
pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// Send a POST request with a JSON body and return the raw response.
pub async fn post_json_raw(app: &Router, uri: &str, body: Value) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body and return `(status, json body)`.
pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = post_json_raw(app, uri, body).await;
    let status = response.status();
    (status, body_json(response).await)
}
