//! Provider detection and endpoint URLs.
//!
//! Providers differ in where the Chat Completions endpoint lives; Azure also
//! routes by deployment and API version instead of by model.

/// Supported LLM providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Azure `OpenAI` Service
    AzureOpenAI {
        /// Deployment name (required for Azure)
        deployment_name: String,
        /// API version (e.g., "2024-08-01-preview")
        api_version: String,
    },
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// Together AI (together.ai, together.xyz)
    TogetherAI,
    /// Groq (groq.com)
    Groq,
    /// Any other OpenAI-compatible endpoint (local servers, proxies).
    Generic,
}

/// API version used for Azure when none is configured.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-08-01-preview";

impl Provider {
    /// Guess the provider from the host in `base_url`.
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let host = base_url.to_lowercase();

        if host.contains("azure.com") {
            Self::AzureOpenAI {
                deployment_name: String::new(),
                api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            }
        } else if host.contains("openrouter.ai") {
            Self::OpenRouter
        } else if host.contains("together.ai") || host.contains("together.xyz") {
            Self::TogetherAI
        } else if host.contains("groq.com") {
            Self::Groq
        } else if host.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Full Chat Completions URL for this provider.
    ///
    /// Azure ignores `model` and addresses the deployment instead.
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str, _model: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI {
                deployment_name,
                api_version,
            } => format!(
                "{base}/openai/deployments/{deployment_name}/chat/completions?api-version={api_version}"
            ),
            Self::Groq if !base.ends_with("/openai") => format!("{base}/openai/v1/chat/completions"),
            _ => format!("{base}/v1/chat/completions"),
        }
    }

    /// Azure authenticates with an `api-key` header instead of a bearer token.
    #[must_use]
    pub fn uses_api_key_header(&self) -> bool {
        matches!(self, Self::AzureOpenAI { .. })
    }
}
