use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::api;
use crate::cache::PromptCache;
use crate::config::AppConfig;
use crate::llm::{ChatCompletionsDriver, LlmDriver, LlmSettings};

/// Build the application router with its middleware stack.
pub fn app(state: AppState) -> Router {
    api::router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(1024 * 1024)),
        )
        .with_state(state)
}

/// Load the cache and serve the dev endpoints until shutdown.
pub async fn start_server(config: Arc<AppConfig>, settings: LlmSettings) -> anyhow::Result<()> {
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        provider = ?settings.provider,
        "LLM configuration loaded"
    );

    let cache = PromptCache::load_or_recover(&config.cache.path, config.cache.on_corrupt).await?;
    let driver: Arc<dyn LlmDriver> = Arc::new(ChatCompletionsDriver::new(settings));
    let state = AppState::new(cache, driver, &config);

    let app = app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        cache = %config.cache.path.display(),
        "Server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!(name: "server.stopping", "Shutdown signal received");
}
