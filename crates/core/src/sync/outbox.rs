//! Producer side of the outbox: the only way application code enqueues mutations.

use std::sync::Arc;

use log::debug;

use crate::errors::{Error, Result};

use super::connectivity::ConnectivityMonitor;
use super::engine::SyncEngine;
use super::model::{generate_local_id, NewLocalRecord, NewSyncQueueItem, SyncAction};
use super::store::LocalStore;

/// Writes optimistic local state, then records the durable intent to sync it.
#[derive(Clone)]
pub struct OutboxService {
    store: Arc<dyn LocalStore>,
    engine: Arc<SyncEngine>,
    connectivity: ConnectivityMonitor,
}

impl OutboxService {
    pub fn new(
        store: Arc<dyn LocalStore>,
        engine: Arc<SyncEngine>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        Self {
            store,
            engine,
            connectivity,
        }
    }

    /// Saves a pending record and enqueues its create. Returns the record id,
    /// generating a local one when `data` carries none.
    pub async fn queue_create(
        &self,
        entity_type: &str,
        endpoint: &str,
        data: serde_json::Value,
    ) -> Result<String> {
        let mut fields = into_object(data)?;
        let id = match fields.get("id") {
            Some(serde_json::Value::String(id)) if !id.is_empty() => id.clone(),
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => generate_local_id(),
        };
        fields.insert("id".to_string(), serde_json::Value::String(id.clone()));
        let payload = serde_json::Value::Object(fields);

        self.store
            .save_record(NewLocalRecord::pending(&id, entity_type, payload.clone()))
            .await?;
        self.store
            .add_to_sync_queue(NewSyncQueueItem::new(
                SyncAction::Create,
                entity_type,
                endpoint,
                payload,
            ))
            .await?;
        debug!("[Outbox] Queued create {} id={}", entity_type, id);

        self.trigger_if_online();
        Ok(id)
    }

    /// Merges `data` into the existing record, if any, and enqueues an update keyed by `id`.
    pub async fn queue_update(
        &self,
        entity_type: &str,
        endpoint: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<()> {
        let mut changes = into_object(data)?;

        if let Some(existing) = self.store.get_record(id).await? {
            let mut merged = match existing.data {
                serde_json::Value::Object(fields) => fields,
                _ => serde_json::Map::new(),
            };
            for (key, value) in &changes {
                merged.insert(key.clone(), value.clone());
            }
            self.store
                .save_record(NewLocalRecord::pending(
                    id,
                    existing.entity_type,
                    serde_json::Value::Object(merged),
                ))
                .await?;
        }

        changes.insert("id".to_string(), serde_json::Value::String(id.to_string()));
        self.store
            .add_to_sync_queue(NewSyncQueueItem::new(
                SyncAction::Update,
                entity_type,
                endpoint,
                serde_json::Value::Object(changes),
            ))
            .await?;
        debug!("[Outbox] Queued update {} id={}", entity_type, id);

        self.trigger_if_online();
        Ok(())
    }

    /// Enqueues the delete before removing the local record, so a crash in
    /// between never loses the intent.
    pub async fn queue_delete(&self, entity_type: &str, endpoint: &str, id: &str) -> Result<()> {
        self.store
            .add_to_sync_queue(NewSyncQueueItem::new(
                SyncAction::Delete,
                entity_type,
                endpoint,
                serde_json::json!({ "id": id }),
            ))
            .await?;
        self.store.delete_record(id).await?;
        debug!("[Outbox] Queued delete {} id={}", entity_type, id);

        self.trigger_if_online();
        Ok(())
    }

    fn trigger_if_online(&self) {
        if !self.connectivity.is_online() {
            return;
        }
        // Outside a runtime there is nothing to spawn on; the periodic timer drains later.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let engine = Arc::clone(&self.engine);
            handle.spawn(async move {
                engine.run().await;
            });
        }
    }
}

fn into_object(data: serde_json::Value) -> Result<serde_json::Map<String, serde_json::Value>> {
    match data {
        serde_json::Value::Object(fields) => Ok(fields),
        other => Err(Error::invalid_input(format!(
            "record data must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
