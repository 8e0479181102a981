use crate::cache::CorruptCachePolicy;
use crate::llm::provider::DEFAULT_AZURE_API_VERSION;
use crate::llm::{LlmSettings, Provider};
use crate::synth::CollisionPolicy;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location of the persisted prompt cache.
pub const DEFAULT_CACHE_PATH: &str = "src/gen/ai-components-cache.json";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Path of the persisted prompt cache
    #[arg(long, env = "AI_CACHE_PATH")]
    pub cache_path: Option<PathBuf>,

    /// Regenerate cached fallback components on the next request
    #[arg(long, env = "RETRY_FALLBACKS")]
    pub retry_fallbacks: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub synthesis: SynthesisConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub on_corrupt: CorruptCachePolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SynthesisConfig {
    pub collision_policy: CollisionPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub retry_fallbacks: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        // Priority: CLI flag / CLI env var > AIGEN_ env > config file > defaults.
        let mut builder = Config::builder()
            .set_default("server.port", 5173)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("cache.path", DEFAULT_CACHE_PATH)?
            .set_default("cache.on_corrupt", "reset")?
            .set_default("synthesis.collision_policy", "suffix")?
            .set_default("generation.temperature", 0.7)?
            .set_default("generation.retry_fallbacks", false)?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path).required(true));
        } else if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::with_name("config.yaml").required(false));
        }

        // E.g. AIGEN_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("AIGEN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(path) = &cli.cache_path {
            builder = builder.set_override("cache.path", path.to_string_lossy().into_owned())?;
        }
        if let Some(retry) = cli.retry_fallbacks {
            builder = builder.set_override("generation.retry_fallbacks", retry)?;
        }

        builder.build()?.try_deserialize()
    }
}

/// Read the LLM connection from `LLM_*` environment variables.
pub fn load_llm_settings(temperature: f32) -> Result<LlmSettings, String> {
    let base_url = std::env::var("LLM_BASE_URL")
        .map_err(|_| "Missing required env var: LLM_BASE_URL".to_string())?;
    if base_url.trim().is_empty() {
        return Err("LLM_BASE_URL cannot be empty".to_string());
    }

    let model = std::env::var("LLM_MODEL")
        .map_err(|_| "Missing required env var: LLM_MODEL".to_string())?;
    if model.trim().is_empty() {
        return Err("LLM_MODEL cannot be empty".to_string());
    }

    let api_key = std::env::var("LLM_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty());

    let mut provider = Provider::detect_from_url(&base_url);
    if let Provider::AzureOpenAI { .. } = provider {
        let deployment_name = std::env::var("AZURE_DEPLOYMENT_NAME")
            .map_err(|_| "AZURE_DEPLOYMENT_NAME is required for Azure OpenAI".to_string())?;
        let api_version = std::env::var("AZURE_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_AZURE_API_VERSION.to_string());
        provider = Provider::AzureOpenAI {
            deployment_name,
            api_version,
        };
    }

    Ok(LlmSettings {
        base_url,
        api_key,
        model,
        provider,
        temperature,
    })
}
