//! Generation gateway.
//!
//! Sits between the resolution endpoint and the text-generation backend:
//! answers from the cache when it can, otherwise asks the model, validates the
//! answer and stores it. It never fails; unusable output is replaced by
//! [`Descriptor::fallback`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, instrument, warn};

use crate::cache::PromptCache;
use crate::descriptor::Descriptor;
use crate::llm::LlmDriver;

/// System instruction sent with every generation request.
pub const SYSTEM_INSTRUCTION: &str = "You are a React component generator. Given a description, \
respond with a single JSON object describing the component and nothing else. The object must have \
a \"componentType\" key holding an HTML tag name such as \"button\" or \"div\", an optional \
\"style\" key holding an object of CSS properties in camelCase with string values, and an optional \
\"children\" key holding either a string, one component object of the same shape, or an array of \
component objects. Put every other property (placeholder, type, href, className, ...) directly at \
the root of the object. Never nest properties under a \"props\" or \"properties\" key.";

const FAILED_REQUEST: &str = "the generation request failed";
const INVALID_RESPONSE: &str = "the model returned an invalid descriptor";

/// How a prompt was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served from the cache without calling the backend.
    Hit,
    /// Generated and cached.
    Generated,
    /// Generation failed; the fallback descriptor was cached.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub descriptor: Descriptor,
    pub outcome: Outcome,
}

impl Resolution {
    fn hit(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            outcome: Outcome::Hit,
        }
    }

    /// Whether this resolution added or replaced a cache entry.
    pub fn is_new(&self) -> bool {
        self.outcome != Outcome::Hit
    }
}

/// Per-prompt lock holding the result of the caller that went first.
/// Callers queued behind it take that result instead of resolving again.
type InFlight = Arc<Mutex<Option<Descriptor>>>;

/// Resolves prompts to descriptors, generating at most once per prompt.
pub struct GenerationGateway {
    cache: Arc<RwLock<PromptCache>>,
    driver: Arc<dyn LlmDriver>,
    /// One slot per prompt currently being resolved.
    in_flight: Mutex<HashMap<String, InFlight>>,
    retry_fallbacks: bool,
}

impl std::fmt::Debug for GenerationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationGateway")
            .field("retry_fallbacks", &self.retry_fallbacks)
            .finish_non_exhaustive()
    }
}

impl GenerationGateway {
    pub fn new(cache: Arc<RwLock<PromptCache>>, driver: Arc<dyn LlmDriver>) -> Self {
        Self {
            cache,
            driver,
            in_flight: Mutex::new(HashMap::new()),
            retry_fallbacks: false,
        }
    }

    /// Treat cached fallback entries as misses in [`GenerationGateway::resolve`].
    #[must_use]
    pub fn with_retry_fallbacks(mut self, enabled: bool) -> Self {
        self.retry_fallbacks = enabled;
        self
    }

    pub fn cache(&self) -> &Arc<RwLock<PromptCache>> {
        &self.cache
    }

    /// Return the cached descriptor for `prompt`, generating it on a miss.
    ///
    /// Concurrent calls for the same missing prompt share one backend call.
    #[instrument(skip(self))]
    pub async fn resolve(&self, prompt: &str) -> Resolution {
        let seen = self.cache.read().await.get(prompt).cloned();
        if let Some(descriptor) = &seen {
            if !(self.retry_fallbacks && descriptor.is_fallback()) {
                return Resolution::hit(descriptor.clone());
            }
        }

        self.exclusive(prompt, |current| match current {
            // Stored by whoever held the lock while we waited.
            Some(descriptor) if Some(&descriptor) != seen.as_ref() => Some(descriptor),
            Some(descriptor) if !(self.retry_fallbacks && descriptor.is_fallback()) => {
                Some(descriptor)
            }
            _ => None,
        })
        .await
    }

    /// Regenerate `prompt` if its cached entry is a fallback or missing.
    /// Successful entries are returned untouched.
    #[instrument(skip(self))]
    pub async fn retry(&self, prompt: &str) -> Resolution {
        self.exclusive(prompt, |current| current.filter(|d| !d.is_fallback()))
            .await
    }

    /// Run get-or-generate for `prompt` while holding its in-flight slot.
    /// `keep` decides whether the entry found after locking is served as is.
    /// Callers that waited on the slot share the first caller's result.
    async fn exclusive<F>(&self, prompt: &str, keep: F) -> Resolution
    where
        F: FnOnce(Option<Descriptor>) -> Option<Descriptor>,
    {
        let slot = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(prompt.to_string()).or_default())
        };

        let resolution = {
            let mut shared = slot.lock().await;
            if let Some(descriptor) = shared.as_ref() {
                Resolution::hit(descriptor.clone())
            } else {
                let current = self.cache.read().await.get(prompt).cloned();
                let resolution = match keep(current) {
                    Some(descriptor) => Resolution::hit(descriptor),
                    None => self.generate_and_store(prompt).await,
                };
                *shared = Some(resolution.descriptor.clone());
                resolution
            }
        };

        let mut in_flight = self.in_flight.lock().await;
        if in_flight
            .get(prompt)
            .is_some_and(|current| Arc::ptr_eq(current, &slot))
        {
            in_flight.remove(prompt);
        }
        resolution
    }

    async fn generate_and_store(&self, prompt: &str) -> Resolution {
        let (descriptor, outcome) = match self.driver.complete(SYSTEM_INSTRUCTION, prompt).await {
            Ok(text) => match Descriptor::parse_generated(&text) {
                Ok(descriptor) => (descriptor, Outcome::Generated),
                Err(e) => {
                    warn!(
                        name: "generation.invalid",
                        error = %e,
                        response_length = text.len(),
                        "Model output is not a valid descriptor, caching fallback"
                    );
                    (Descriptor::fallback(INVALID_RESPONSE), Outcome::Fallback)
                }
            },
            Err(e) => {
                error!(
                    name: "generation.failed",
                    error = %e,
                    "Generation request failed, caching fallback"
                );
                (Descriptor::fallback(FAILED_REQUEST), Outcome::Fallback)
            }
        };

        self.cache.write().await.put(prompt, descriptor.clone());

        if outcome == Outcome::Generated {
            info!(
                name: "generation.completed",
                component_type = %descriptor.component_type,
                "Component generated"
            );
        }

        Resolution {
            descriptor,
            outcome,
        }
    }
}
