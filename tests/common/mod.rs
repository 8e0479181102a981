#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ai_gen::AppState;
use ai_gen::cache::PromptCache;
use ai_gen::config::AppConfig;
use ai_gen::llm::LlmDriver;
use async_trait::async_trait;

/// Backend stub that replies with a fixed text (or fails) and counts calls.
pub struct StubDriver {
    reply: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubDriver {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmDriver for StubDriver {
    async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => anyhow::bail!("backend unavailable"),
        }
    }
}

pub const BUTTON_JSON: &str = r#"{"componentType":"button","style":{"backgroundColor":"blue","borderRadius":"8px"},"children":"Click me!"}"#;

pub fn default_config() -> AppConfig {
    AppConfig::load_from_args(["ai-gen"]).expect("default config")
}

pub fn state_with(cache: PromptCache, driver: Arc<StubDriver>) -> AppState {
    AppState::new(cache, driver, &default_config())
}

pub fn cache_path(dir: &Path) -> std::path::PathBuf {
    dir.join("gen").join("ai-components-cache.json")
}
