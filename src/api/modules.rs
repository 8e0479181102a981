//! Dev-server module graph for the generated-components module.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use tokio::sync::RwLock;

use crate::AppState;
use crate::synth::{ModuleSnapshot, RESOLVED_VIRTUAL_MODULE_ID, Synthesis, VIRTUAL_MODULE_ID, VirtualModule};

/// Memoizes the last synthesized module until the cache changes.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    module: VirtualModule,
    loaded: Arc<RwLock<Option<Arc<Synthesis>>>>,
}

impl ModuleGraph {
    pub fn new(module: VirtualModule) -> Self {
        Self {
            module,
            loaded: Arc::new(RwLock::new(None)),
        }
    }

    /// The current module, synthesizing it if it was invalidated.
    pub async fn get(&self) -> Option<Arc<Synthesis>> {
        if let Some(loaded) = self.loaded.read().await.as_ref() {
            return Some(Arc::clone(loaded));
        }

        // Held across synthesis so an invalidation cannot be overwritten by a
        // module built from the old cache.
        let mut loaded = self.loaded.write().await;
        if let Some(loaded) = loaded.as_ref() {
            return Some(Arc::clone(loaded));
        }
        let resolved = self.module.resolve_id(VIRTUAL_MODULE_ID)?;
        let synthesis = Arc::new(self.module.load(resolved).await?);
        *loaded = Some(Arc::clone(&synthesis));
        Some(synthesis)
    }

    /// Drop the memoized module so the next request regenerates it.
    pub async fn invalidate_all(&self) {
        self.loaded.write().await.take();
        tracing::debug!(
            name: "modules.invalidated",
            module = %RESOLVED_VIRTUAL_MODULE_ID.trim_start_matches('\0'),
            "Module graph invalidated"
        );
    }

    pub async fn is_loaded(&self) -> bool {
        self.loaded.read().await.is_some()
    }
}

/// GET /@id/virtual:generated-components - the module source.
pub async fn module_source(State(state): State<AppState>) -> impl IntoResponse {
    match state.modules.get().await {
        Some(module) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
            module.source.clone(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /__ai-cache/module - the module's exports as data.
pub async fn module_snapshot(State(state): State<AppState>) -> Json<ModuleSnapshot> {
    Json(
        state
            .modules
            .get()
            .await
            .map(|module| module.snapshot())
            .unwrap_or_default(),
    )
}
