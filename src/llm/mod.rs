//! Text-generation backend.
//!
//! The generation gateway only needs one capability from a model:
//! `complete(system, user) -> text`. The [`LlmDriver`] trait captures that
//! boundary so the gateway can be exercised with scripted drivers in tests,
//! and [`ChatCompletionsDriver`] implements it against any OpenAI-compatible
//! Chat Completions endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use ai_gen::llm::{ChatCompletionsDriver, LlmSettings, Provider};
//!
//! let settings = LlmSettings {
//!     base_url: "https://api.openai.com".to_string(),
//!     api_key: Some("sk-...".to_string()),
//!     model: "gpt-4o-mini".to_string(),
//!     provider: Provider::OpenAI,
//!     temperature: 0.7,
//! };
//! let driver = ChatCompletionsDriver::new(settings);
//! ```

pub mod chat_completions;
pub mod provider;

pub use chat_completions::ChatCompletionsDriver;
pub use provider::Provider;

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for bearer authentication.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Provider type (auto-detected from `base_url` by the config loader).
    pub provider: Provider,
    /// Sampling temperature sent with every request.
    pub temperature: f32,
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// A model that completes a system instruction plus one user message.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Return the model's text response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response carries no text.
    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String>;
}
