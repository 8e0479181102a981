//! AI component generation dev server.
//!
//! Entry point: loads configuration, initializes logging and serves the
//! resolution endpoint.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use ai_gen::config::{AppConfig, load_llm_settings};
use ai_gen::telemetry::{self, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenvy::dotenv();

    // Initialize tracing (M-LOG-STRUCTURED)
    telemetry::init(LogFormat::from_env());

    let config = match AppConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let settings = match load_llm_settings(config.generation.temperature) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Configuration error: {msg}");
            std::process::exit(1);
        }
    };

    ai_gen::server::start_server(config, settings).await
}
