//! Consumer-side lazy resolver.
//!
//! A [`ComponentSlot`] stands in for a component declared by prompt. It first
//! looks the prompt up in the generated module; on a miss it asks the
//! resolution endpoint to generate it and builds an inline [`Factory`] from
//! the returned descriptor. Failures surface as [`ResolveState::Failed`],
//! never as panics.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::api::routes::RESOLVE_PATH;
use crate::descriptor::Descriptor;
use crate::error::ClientError;
use crate::render::Factory;
use crate::sanitize::sanitize;
use crate::synth::{ModuleSnapshot, VIRTUAL_MODULE_ID, VirtualModule};

/// Path serving the generated module's exports as data.
pub const MODULE_PATH: &str = "/__ai-cache/module";

/// Where the current generated-module exports come from.
#[async_trait]
pub trait ModuleSource: Send + Sync {
    async fn snapshot(&self) -> Result<ModuleSnapshot, ClientError>;
}

/// A fixed set of exports.
#[async_trait]
impl ModuleSource for ModuleSnapshot {
    async fn snapshot(&self) -> Result<ModuleSnapshot, ClientError> {
        Ok(self.clone())
    }
}

/// The in-process module, synthesized from the live cache on each lookup.
#[async_trait]
impl ModuleSource for VirtualModule {
    async fn snapshot(&self) -> Result<ModuleSnapshot, ClientError> {
        let Some(resolved) = self.resolve_id(VIRTUAL_MODULE_ID) else {
            return Ok(ModuleSnapshot::default());
        };
        Ok(self
            .load(resolved)
            .await
            .map(|synthesis| synthesis.snapshot())
            .unwrap_or_default())
    }
}

/// Fetches the module exports from a running dev server.
#[derive(Debug, Clone)]
pub struct HttpModuleSource {
    http: reqwest::Client,
    url: Url,
}

impl HttpModuleSource {
    pub fn new(http: reqwest::Client, base_url: &Url) -> Result<Self, ClientError> {
        Ok(Self {
            http,
            url: base_url.join(MODULE_PATH)?,
        })
    }
}

#[async_trait]
impl ModuleSource for HttpModuleSource {
    async fn snapshot(&self) -> Result<ModuleSnapshot, ClientError> {
        let response = self.http.get(self.url.clone()).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Client for `POST /__ai-cache`.
#[derive(Debug, Clone)]
pub struct ResolveClient {
    http: reqwest::Client,
    url: Url,
}

impl ResolveClient {
    pub fn new(http: reqwest::Client, base_url: &Url) -> Result<Self, ClientError> {
        Ok(Self {
            http,
            url: base_url.join(RESOLVE_PATH)?,
        })
    }

    /// Ask the endpoint to generate `prompt` and return its descriptor.
    ///
    /// The response carries the whole cache; only the entry stored under the
    /// exact prompt is accepted.
    pub async fn resolve(&self, prompt: &str) -> Result<Descriptor, ClientError> {
        let mut body = serde_json::Map::new();
        body.insert(prompt.to_string(), Value::String(prompt.to_string()));
        let response = self.http.post(self.url.clone()).json(&body).send().await?;
        let response = check_status(response).await?;

        let mut cache: IndexMap<String, Value> = response.json().await?;
        let value = cache.shift_remove(prompt).ok_or(ClientError::NotFound)?;
        Ok(Descriptor::from_value(value)?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(text);
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Module lookup first, endpoint on a miss.
pub struct ComponentResolver {
    module: Arc<dyn ModuleSource>,
    endpoint: ResolveClient,
}

impl fmt::Debug for ComponentResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentResolver")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl ComponentResolver {
    pub fn new(module: Arc<dyn ModuleSource>, endpoint: ResolveClient) -> Self {
        Self { module, endpoint }
    }

    /// Resolver talking to a dev server at `base_url` for both lookups.
    pub fn connect(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let module = HttpModuleSource::new(http.clone(), &base_url)?;
        let endpoint = ResolveClient::new(http, &base_url)?;
        Ok(Self::new(Arc::new(module), endpoint))
    }

    pub async fn resolve(&self, prompt: &str) -> Result<Factory, ClientError> {
        match self.module.snapshot().await {
            Ok(snapshot) => {
                if let Some(factory) = lookup(&snapshot, prompt) {
                    debug!(name: "client.module_hit", prompt = %prompt, "Prompt found in module");
                    return Ok(factory);
                }
            }
            Err(e) => {
                warn!(name: "client.module_unavailable", error = %e, "Module lookup failed, asking endpoint");
            }
        }

        let descriptor = self.endpoint.resolve(prompt).await?;
        debug!(name: "client.generated", prompt = %prompt, "Prompt resolved by endpoint");
        Ok(Factory::new(descriptor))
    }
}

/// Binding for `prompt`: the manifest entry if there is one, else the
/// sanitized identifier.
pub fn lookup(snapshot: &ModuleSnapshot, prompt: &str) -> Option<Factory> {
    let name = snapshot
        .manifest
        .get(prompt)
        .cloned()
        .unwrap_or_else(|| sanitize(prompt));
    snapshot.bindings.get(&name).cloned().map(Factory::new)
}

/// What a slot currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveState {
    Loading,
    Ready(Factory),
    /// Error view.
    Failed { prompt: String, message: String },
}

impl ResolveState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn factory(&self) -> Option<&Factory> {
        match self {
            Self::Ready(factory) => Some(factory),
            _ => None,
        }
    }
}

/// A mounted placeholder for one prompt.
///
/// Each resolution task carries the epoch it was started in. [`set_prompt`]
/// and [`unmount`] advance the epoch under the watch lock, so a task that
/// finishes late never overwrites newer state.
///
/// [`set_prompt`]: ComponentSlot::set_prompt
/// [`unmount`]: ComponentSlot::unmount
pub struct ComponentSlot {
    resolver: Arc<ComponentResolver>,
    prompt: String,
    state: Arc<watch::Sender<ResolveState>>,
    epoch: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
    mounted: bool,
}

impl fmt::Debug for ComponentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSlot")
            .field("prompt", &self.prompt)
            .field("state", &*self.state.borrow())
            .field("mounted", &self.mounted)
            .finish()
    }
}

impl ComponentSlot {
    /// Start resolving `prompt`. Must be called inside a Tokio runtime.
    pub fn mount(prompt: impl Into<String>, resolver: Arc<ComponentResolver>) -> Self {
        let (tx, _) = watch::channel(ResolveState::Loading);
        let mut slot = Self {
            resolver,
            prompt: prompt.into(),
            state: Arc::new(tx),
            epoch: Arc::new(AtomicU64::new(0)),
            task: None,
            mounted: true,
        };
        slot.spawn(0);
        slot
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn subscribe(&self) -> watch::Receiver<ResolveState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ResolveState {
        self.state.borrow().clone()
    }

    /// Wait until the current resolution leaves `Loading`.
    ///
    /// Never completes for an unmounted slot that was still loading.
    pub async fn settled(&self) -> ResolveState {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    /// Switch to a new prompt: abort the running resolution and start over.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        if !self.mounted {
            return;
        }
        self.abort();
        self.prompt = prompt.into();

        let mut epoch = 0;
        self.state.send_modify(|state| {
            epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            *state = ResolveState::Loading;
        });
        self.spawn(epoch);
    }

    /// Tear down the slot. No state is published afterwards.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.state.send_if_modified(|_| {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            false
        });
        self.abort();
    }

    fn spawn(&mut self, epoch: u64) {
        let resolver = Arc::clone(&self.resolver);
        let prompt = self.prompt.clone();
        let state = Arc::clone(&self.state);
        let current = Arc::clone(&self.epoch);

        self.task = Some(tokio::spawn(async move {
            let next = match resolver.resolve(&prompt).await {
                Ok(factory) => ResolveState::Ready(factory),
                Err(e) => {
                    warn!(name: "client.failed", prompt = %prompt, error = %e, "Component resolution failed");
                    ResolveState::Failed {
                        prompt,
                        message: e.to_string(),
                    }
                }
            };
            state.send_if_modified(|slot| {
                if current.load(Ordering::SeqCst) != epoch {
                    return false;
                }
                *slot = next;
                true
            });
        }));
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ComponentSlot {
    fn drop(&mut self) {
        self.unmount();
    }
}
