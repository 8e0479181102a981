//! AI component generation dev server.
//!
//! UI code declares components by natural-language prompt. This crate turns
//! each prompt into a structured component descriptor with an LLM, caches the
//! result on disk, synthesizes a virtual module exporting one factory per
//! prompt, and serves a resolution endpoint that generates missing prompts on
//! demand and tells running pages to reload.
//!
//! # Modules
//!
//! - [`sanitize`]: prompt → identifier mapping shared by server and client
//! - [`descriptor`]: the component descriptor model and its validation
//! - [`render`]: descriptor → render instruction lowering
//! - [`cache`]: the persistent prompt cache
//! - [`synth`]: virtual module synthesis
//! - [`gateway`]: cache-first generation with fallback
//! - [`llm`]: the text-generation backend
//! - [`api`]: HTTP routes (resolution endpoint, module, reload events)
//! - [`client`]: consumer-side lazy resolver

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod render;
pub mod sanitize;
pub mod server;
pub mod synth;
pub mod telemetry;

use std::sync::Arc;

use tokio::sync::RwLock;

use api::modules::ModuleGraph;
use api::sse::LiveReload;
use cache::PromptCache;
use config::AppConfig;
use gateway::GenerationGateway;
use llm::LlmDriver;
use synth::VirtualModule;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The process-wide prompt cache.
    pub cache: Arc<RwLock<PromptCache>>,
    /// Cache-first generation.
    pub gateway: Arc<GenerationGateway>,
    /// Memoized generated-components module.
    pub modules: ModuleGraph,
    /// Reload signal channel for connected pages.
    pub reload: LiveReload,
}

impl AppState {
    pub fn new(cache: PromptCache, driver: Arc<dyn LlmDriver>, config: &AppConfig) -> Self {
        let cache = Arc::new(RwLock::new(cache));
        let gateway = GenerationGateway::new(Arc::clone(&cache), driver)
            .with_retry_fallbacks(config.generation.retry_fallbacks);
        let modules = ModuleGraph::new(VirtualModule::new(
            Arc::clone(&cache),
            config.synthesis.collision_policy,
        ));

        Self {
            cache,
            gateway: Arc::new(gateway),
            modules,
            reload: LiveReload::new(),
        }
    }
}
