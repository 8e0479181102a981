//! OpenAI Chat Completions driver.
//!
//! Sends a single non-streaming request per prompt and returns the content of
//! the first choice.

use anyhow::Context;
use uuid::Uuid;

use super::{LlmDriver, LlmSettings, Message};

/// Driver for the OpenAI Chat Completions API.
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .field("provider", &self.settings.provider)
            .finish()
    }
}

impl ChatCompletionsDriver {
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }
}

#[async_trait::async_trait]
impl LlmDriver for ChatCompletionsDriver {
    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String> {
        let request_id = Uuid::new_v4().to_string();
        let url = self
            .settings
            .provider
            .build_chat_url(&self.settings.base_url, &self.settings.model);

        let body = serde_json::json!({
            "model": self.settings.model,
            "messages": [Message::system(system), Message::user(user)],
            "temperature": self.settings.temperature,
        });

        tracing::debug!(
            request_id = %request_id,
            url = %url,
            model = %self.settings.model,
            "Sending chat completion request"
        );

        let mut rb = self.http.post(&url).json(&body);
        if let Some(key) = &self.settings.api_key {
            rb = if self.settings.provider.uses_api_key_header() {
                rb.header("api-key", key)
            } else {
                rb.bearer_auth(key)
            };
        }

        let resp = rb.send().await?.error_for_status()?;
        let v: serde_json::Value = resp.json().await?;

        let content = v["choices"][0]["message"]["content"]
            .as_str()
            .context("chat completion response has no message content")?
            .to_string();

        tracing::debug!(
            request_id = %request_id,
            content_length = content.len(),
            "Chat completion received"
        );

        Ok(content)
    }
}
