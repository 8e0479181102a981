//! Resolution endpoint and route table.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use indexmap::IndexMap;
use serde_json::Value;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use super::modules::{module_snapshot, module_source};
use super::sse::{ReloadEvent, build_sse_response};
use super::ApiError;
use crate::AppState;
use crate::descriptor::Descriptor;
use crate::gateway::Resolution;

/// Path of the resolution endpoint.
pub const RESOLVE_PATH: &str = "/__ai-cache";

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route(RESOLVE_PATH, post(resolve_batch).get(get_cache))
        .route("/__ai-cache/retry", post(retry_batch))
        .route("/__ai-cache/events", get(reload_events))
        .route("/__ai-cache/module", get(module_snapshot))
        .route("/@id/virtual:generated-components", get(module_source))
        .route("/health", get(|| async { "ok" }))
}

type CacheBody = Json<IndexMap<String, Descriptor>>;

#[derive(Debug, Clone, Copy)]
enum BatchMode {
    Resolve,
    Retry,
}

/// POST /__ai-cache - resolve a batch of prompts and return the whole cache.
async fn resolve_batch(State(state): State<AppState>, body: Bytes) -> Result<CacheBody, ApiError> {
    process_batch(&state, &body, BatchMode::Resolve).await
}

/// POST /__ai-cache/retry - regenerate prompts whose cached entry is a fallback.
async fn retry_batch(State(state): State<AppState>, body: Bytes) -> Result<CacheBody, ApiError> {
    process_batch(&state, &body, BatchMode::Retry).await
}

/// GET /__ai-cache - the whole cache, without generating anything.
async fn get_cache(State(state): State<AppState>) -> CacheBody {
    Json(state.cache.read().await.snapshot())
}

/// GET /__ai-cache/events - SSE stream of reload signals.
async fn reload_events(State(state): State<AppState>) -> impl IntoResponse {
    let stream = BroadcastStream::new(state.reload.subscribe())
        .filter_map(|res: Result<ReloadEvent, _>| res.ok());
    build_sse_response(stream)
}

async fn process_batch(state: &AppState, body: &[u8], mode: BatchMode) -> Result<CacheBody, ApiError> {
    let prompts = parse_batch(body)?;

    let mut generated = 0usize;
    let mut fallbacks = 0usize;
    for prompt in &prompts {
        let resolution: Resolution = match mode {
            BatchMode::Resolve => state.gateway.resolve(prompt).await,
            BatchMode::Retry => state.gateway.retry(prompt).await,
        };
        if resolution.is_new() {
            generated += 1;
            if resolution.descriptor.is_fallback() {
                fallbacks += 1;
            }
        }
    }

    info!(
        name: "resolve.batch",
        mode = ?mode,
        prompts = prompts.len(),
        generated,
        fallbacks,
        "Prompt batch processed"
    );

    persist_and_notify(state).await?;
    Ok(Json(state.cache.read().await.snapshot()))
}

/// Prompts of a batch body, in body order. Non-string values are skipped.
fn parse_batch(body: &[u8]) -> Result<Vec<String>, ApiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;
    let Value::Object(entries) = value else {
        return Err(ApiError::BadRequest(
            "body must be a JSON object mapping keys to prompts".to_string(),
        ));
    };
    Ok(entries
        .into_iter()
        .filter_map(|(_, v)| match v {
            Value::String(prompt) => Some(prompt),
            _ => None,
        })
        .collect())
}

/// Flush a dirty cache, then invalidate the module and tell clients to reload.
async fn persist_and_notify(state: &AppState) -> Result<(), ApiError> {
    let written = state.cache.write().await.flush().await?;
    if written {
        state.modules.invalidate_all().await;
        state.reload.notify(ReloadEvent::FullReload);
    }
    Ok(())
}
