//! Server-side event bus feeding the SSE stream.

use fieldsync_core::sync::{SubscriptionId, SyncClient, SyncEvent};
use serde::Serialize;
use tokio::sync::broadcast;

pub const SYNC_START: &str = "sync-start";
pub const SYNC_PROGRESS: &str = "sync-progress";
pub const SYNC_COMPLETE: &str = "sync-complete";
pub const SYNC_ERROR: &str = "sync-error";
pub const CONNECTIVITY_CHANGED: &str = "connectivity-changed";

const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ServerEvent {
    pub fn new(event: &str) -> Self {
        Self {
            event: event.to_string(),
            payload: None,
        }
    }

    pub fn with_payload(event: &str, payload: serde_json::Value) -> Self {
        Self {
            event: event.to_string(),
            payload: Some(payload),
        }
    }

    pub fn from_sync_event(event: &SyncEvent) -> Self {
        let name = match event {
            SyncEvent::Start => SYNC_START,
            SyncEvent::Progress { .. } => SYNC_PROGRESS,
            SyncEvent::Complete { .. } => SYNC_COMPLETE,
            SyncEvent::Error { .. } => SYNC_ERROR,
        };
        match event {
            SyncEvent::Start => Self::new(name),
            other => Self::with_payload(name, serde_json::to_value(other).unwrap_or_default()),
        }
    }
}

/// Fan-out of server events. Publishing with no subscribers is a no-op.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ServerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }
}

/// Forwards every sync lifecycle event from `client` onto `bus`.
pub fn bridge_sync_events(client: &SyncClient, bus: EventBus) -> SubscriptionId {
    client.subscribe(move |event| bus.publish(ServerEvent::from_sync_event(event)))
}
