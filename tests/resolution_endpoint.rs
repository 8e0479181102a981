mod common;

use std::sync::Arc;

use ai_gen::AppState;
use ai_gen::api::sse::ReloadEvent;
use ai_gen::cache::PromptCache;
use ai_gen::client::lookup;
use ai_gen::descriptor::{Children, Descriptor};
use ai_gen::render::{Props, RenderChildren};
use ai_gen::server::app;
use ai_gen::synth::ModuleSnapshot;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{BUTTON_JSON, StubDriver, cache_path, state_with};

const BLUE_BUTTON: &str = r#"a blue button with rounded corners that says "Click me!""#;
const RED_INPUT: &str = "a red input field with a placeholder";

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn post(state: &AppState, path: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = send(state, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get(state: &AppState, path: &str) -> (StatusCode, Vec<u8>) {
    send(state, Request::get(path).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn test_miss_generates_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = cache_path(dir.path());
    let driver = StubDriver::replying(BUTTON_JSON);
    let state = state_with(PromptCache::empty(&path), driver.clone());

    let body = json!({ "k1": BLUE_BUTTON }).to_string();
    let (status, response) = post(&state, "/__ai-cache", &body).await;

    assert_eq!(status, StatusCode::OK);
    let entries = response.as_object().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[BLUE_BUTTON]["componentType"], "button");
    assert_eq!(driver.calls(), 1);

    let reloaded = PromptCache::load(&path).await.unwrap();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.get(BLUE_BUTTON).unwrap().component_type, "button");
}

#[tokio::test]
async fn test_cached_prompt_is_not_regenerated() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = PromptCache::empty(cache_path(dir.path()));
    let existing = Descriptor::new("input").with_extra("placeholder", json!("Type here"));
    cache.put(RED_INPUT, existing.clone());
    cache.flush().await.unwrap();

    let driver = StubDriver::replying(BUTTON_JSON);
    let state = state_with(cache, driver.clone());

    let body = json!({ "whatever": RED_INPUT }).to_string();
    let (status, response) = post(&state, "/__ai-cache", &body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(driver.calls(), 0);
    let returned: Descriptor = serde_json::from_value(response[RED_INPUT].clone()).unwrap();
    assert_eq!(returned, existing);
}

#[tokio::test]
async fn test_failed_generation_is_cached_as_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let driver = StubDriver::failing();
    let state = state_with(PromptCache::empty(cache_path(dir.path())), driver.clone());

    let body = json!({ "k": BLUE_BUTTON }).to_string();
    let (status, first) = post(&state, "/__ai-cache", &body).await;
    assert_eq!(status, StatusCode::OK);

    let fallback: Descriptor = serde_json::from_value(first[BLUE_BUTTON].clone()).unwrap();
    assert!(fallback.is_fallback());
    assert_eq!(fallback.component_type, "div");
    assert_eq!(driver.calls(), 1);

    let (_, second) = post(&state, "/__ai-cache", &body).await;
    assert_eq!(second[BLUE_BUTTON], first[BLUE_BUTTON]);
    assert_eq!(driver.calls(), 1);
}

#[tokio::test]
async fn test_retry_regenerates_only_fallbacks() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = PromptCache::empty(cache_path(dir.path()));
    cache.put(BLUE_BUTTON, Descriptor::fallback("the generation request failed"));
    cache.put(RED_INPUT, Descriptor::new("input"));

    let driver = StubDriver::replying(BUTTON_JSON);
    let state = state_with(cache, driver.clone());

    let body = json!({ "a": BLUE_BUTTON, "b": RED_INPUT }).to_string();
    let (status, response) = post(&state, "/__ai-cache/retry", &body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(driver.calls(), 1);
    assert_eq!(response[BLUE_BUTTON]["componentType"], "button");
    assert_eq!(response[RED_INPUT]["componentType"], "input");
}

#[tokio::test]
async fn test_rejects_non_object_body() {
    let dir = tempfile::tempdir().unwrap();
    let driver = StubDriver::replying(BUTTON_JSON);
    let state = state_with(PromptCache::empty(cache_path(dir.path())), driver.clone());

    for body in ["[\"a prompt\"]", "not json", "\"a prompt\""] {
        let (status, response) = post_raw(&state, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert!(response["error"].is_string());
    }
    assert_eq!(driver.calls(), 0);
}

async fn post_raw(state: &AppState, body: &str) -> (StatusCode, Value) {
    let request = Request::post("/__ai-cache")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = send(state, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_non_string_values_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let driver = StubDriver::replying(BUTTON_JSON);
    let state = state_with(PromptCache::empty(cache_path(dir.path())), driver.clone());

    let body = json!({ "n": 42, "o": { "nested": true }, "p": BLUE_BUTTON }).to_string();
    let (status, response) = post(&state, "/__ai-cache", &body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.as_object().unwrap().len(), 1);
    assert_eq!(driver.calls(), 1);
}

#[tokio::test]
async fn test_flush_failure_returns_500_and_stays_dirty() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let driver = StubDriver::replying(BUTTON_JSON);
    let state = state_with(PromptCache::empty(blocker.join("cache.json")), driver.clone());
    let mut events = state.reload.subscribe();

    let body = json!({ "k": BLUE_BUTTON }).to_string();
    let (status, response) = post(&state, "/__ai-cache", &body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response["error"].as_str().unwrap().contains("blocker"));
    assert!(state.cache.read().await.is_dirty());
    assert!(events.try_recv().is_err());

    // The entry survives in memory; a retry does not call the backend again.
    let (status, _) = post(&state, "/__ai-cache", &body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(driver.calls(), 1);
}

#[tokio::test]
async fn test_new_entries_invalidate_module_and_signal_reload() {
    let dir = tempfile::tempdir().unwrap();
    let driver = StubDriver::replying(BUTTON_JSON);
    let state = state_with(PromptCache::empty(cache_path(dir.path())), driver.clone());
    let mut events = state.reload.subscribe();

    let (status, source) = get(&state, "/@id/virtual:generated-components").await;
    assert_eq!(status, StatusCode::OK);
    let source = String::from_utf8(source).unwrap();
    assert!(source.starts_with("import React from 'react';"));
    assert!(!source.contains("blue_button"));
    assert!(state.modules.is_loaded().await);

    let body = json!({ "k": BLUE_BUTTON }).to_string();
    post(&state, "/__ai-cache", &body).await;

    assert_eq!(events.try_recv().unwrap(), ReloadEvent::FullReload);
    assert!(!state.modules.is_loaded().await);

    let (_, source) = get(&state, "/@id/virtual:generated-components").await;
    let source = String::from_utf8(source).unwrap();
    assert!(source.contains("export const blue_button_with_rounded_corners"));
    assert!(source.contains("export const __aiGenManifest"));

    // A batch of hits writes nothing and signals nothing.
    post(&state, "/__ai-cache", &body).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_generated_factory_merges_caller_props() {
    let dir = tempfile::tempdir().unwrap();
    let driver = StubDriver::replying(BUTTON_JSON);
    let state = state_with(PromptCache::empty(cache_path(dir.path())), driver);

    post(&state, "/__ai-cache", &json!({ "k": BLUE_BUTTON }).to_string()).await;

    let (status, body) = get(&state, "/__ai-cache/module").await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: ModuleSnapshot = serde_json::from_slice(&body).unwrap();

    let factory = lookup(&snapshot, BLUE_BUTTON).unwrap();
    let mut props = Props::new();
    props.insert("className".to_string(), json!("big"));
    let node = factory.call(&props);

    assert_eq!(node.component_type, "button");
    assert_eq!(node.props["backgroundColor"], "blue");
    assert_eq!(node.props["className"], "big");
    assert_eq!(node.children, RenderChildren::Text("Click me!".to_string()));
}

#[tokio::test]
async fn test_get_cache_does_not_generate() {
    let dir = tempfile::tempdir().unwrap();
    let mut cache = PromptCache::empty(cache_path(dir.path()));
    cache.put(
        RED_INPUT,
        Descriptor::new("form").with_children(Children::Many(vec![Descriptor::new("input")])),
    );
    let driver = StubDriver::replying(BUTTON_JSON);
    let state = state_with(cache, driver.clone());

    let (status, body) = get(&state, "/__ai-cache").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body[RED_INPUT]["children"][0]["componentType"], "input");
    assert_eq!(driver.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_generation() {
    let dir = tempfile::tempdir().unwrap();
    let driver = StubDriver::slow(BUTTON_JSON, std::time::Duration::from_millis(50));
    let state = state_with(PromptCache::empty(cache_path(dir.path())), driver.clone());
    let state = Arc::new(state);

    let body = json!({ "k": BLUE_BUTTON }).to_string();
    let requests = (0..4).map(|_| {
        let state = Arc::clone(&state);
        let body = body.clone();
        tokio::spawn(async move { post(&state, "/__ai-cache", &body).await.0 })
    });

    for status in futures::future::join_all(requests).await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }
    assert_eq!(driver.calls(), 1);
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with(
        PromptCache::empty(cache_path(dir.path())),
        StubDriver::replying(BUTTON_JSON),
    );
    let (status, body) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}
