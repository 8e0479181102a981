//! Reload signals over Server-Sent Events.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;

/// Push notification for connected dev clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReloadEvent {
    /// The module graph was invalidated; reload the page.
    FullReload,
}

impl ReloadEvent {
    fn name(self) -> &'static str {
        match self {
            Self::FullReload => "full-reload",
        }
    }
}

/// Broadcast channel carrying [`ReloadEvent`]s to every SSE subscriber.
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<ReloadEvent>,
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveReload {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Send `event` to all subscribers. Returns how many received it.
    pub fn notify(&self, event: ReloadEvent) -> usize {
        // No subscribers is the normal state when no page is open.
        let receivers = self.tx.send(event).unwrap_or(0);
        tracing::debug!(
            name: "reload.sent",
            event = event.name(),
            receivers,
            "Reload signal broadcast"
        );
        receivers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }
}

pub fn build_sse_response<S>(stream: S) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send>
where
    S: Stream<Item = ReloadEvent> + Send + 'static,
{
    let stream = stream.map(|event| {
        let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event(event.name()).data(json))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
