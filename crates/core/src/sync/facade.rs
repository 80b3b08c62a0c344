//! Client-facing facade: aggregated sync state and manual actions for presentation code.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::errors::Result;

use super::connectivity::{run_connectivity_loop, ConnectivityMonitor};
use super::dispatch::RemoteDispatcher;
use super::engine::{SyncEngine, SyncRunResult};
use super::events::{SubscriptionId, SyncEvent, SyncEventBus};
use super::model::StorageStats;
use super::outbox::OutboxService;
use super::scheduler::SyncConfig;
use super::store::{LocalStore, LAST_SYNC_AT_KEY};

/// Snapshot of everything the presentation layer renders about sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncClientState {
    pub is_online: bool,
    pub is_syncing: bool,
    pub pending_count: u64,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
}

pub struct SyncClient {
    store: Arc<dyn LocalStore>,
    engine: Arc<SyncEngine>,
    outbox: OutboxService,
    connectivity: ConnectivityMonitor,
    config: SyncConfig,
    sync_error: Arc<RwLock<Option<String>>>,
    background_task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncClient {
    pub fn new(
        store: Arc<dyn LocalStore>,
        dispatcher: Arc<dyn RemoteDispatcher>,
        connectivity: ConnectivityMonitor,
        config: SyncConfig,
    ) -> Arc<Self> {
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&store),
            dispatcher,
            connectivity.clone(),
            config.clone(),
        ));
        let outbox = OutboxService::new(
            Arc::clone(&store),
            Arc::clone(&engine),
            connectivity.clone(),
        );

        let sync_error = Arc::new(RwLock::new(None));
        let error_slot = Arc::clone(&sync_error);
        engine.events().subscribe(move |event| {
            let next = match event {
                SyncEvent::Error { message } => Some(Some(message.clone())),
                // Empty runs leave the previous error visible.
                SyncEvent::Complete { total: 0, .. } => None,
                SyncEvent::Complete { failed: 0, .. } => Some(None),
                SyncEvent::Complete { failed, total, .. } => Some(Some(format!(
                    "{} of {} pending changes failed to sync",
                    failed, total
                ))),
                SyncEvent::Start | SyncEvent::Progress { .. } => None,
            };
            if let Some(next) = next {
                *error_slot
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
            }
        });

        Arc::new(Self {
            store,
            engine,
            outbox,
            connectivity,
            config,
            sync_error,
            background_task: Mutex::new(None),
        })
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn outbox(&self) -> &OutboxService {
        &self.outbox
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<SyncEventBus> {
        self.engine.events()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.engine.events().subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.engine.events().unsubscribe(id)
    }

    pub fn sync_error(&self) -> Option<String> {
        self.sync_error
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn clear_error(&self) {
        *self
            .sync_error
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    /// Reads the aggregate state. Pending count and last sync time come from storage.
    pub async fn state(&self) -> Result<SyncClientState> {
        let stats = self.store.get_storage_stats().await?;
        let last_sync_time = self
            .store
            .get_metadata(LAST_SYNC_AT_KEY)
            .await?
            .and_then(|value| value.as_str().map(str::to_string))
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(SyncClientState {
            is_online: self.connectivity.is_online(),
            is_syncing: self.engine.is_syncing(),
            pending_count: stats.sync_queue_length,
            last_sync_time,
            sync_error: self.sync_error(),
        })
    }

    /// Reports a connectivity change from the host environment.
    pub fn set_online(&self, online: bool) -> bool {
        self.connectivity.set_online(online)
    }

    pub async fn manual_sync(&self) -> SyncRunResult {
        info!("[Sync] Manual sync requested");
        self.engine.run().await
    }

    pub async fn clear_pending(&self) -> Result<usize> {
        self.engine.clear_pending().await
    }

    pub async fn get_storage_stats(&self) -> Result<StorageStats> {
        self.store.get_storage_stats().await
    }

    /// Starts the connectivity/interval loop. A loop that is still running is kept.
    ///
    /// The loop only holds a weak reference, so dropping the last client handle ends it.
    pub async fn start_background(self: &Arc<Self>) {
        let mut guard = self.background_task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
            guard.take();
        }
        debug!("[Sync] Starting background loop");
        // Subscribe before spawning so a transition reported right after this call is observed.
        let online_rx = self.connectivity.subscribe();
        *guard = Some(tokio::spawn(run_connectivity_loop(
            Arc::downgrade(self),
            self.config.clone(),
            online_rx,
        )));
    }

    pub async fn stop_background(&self) {
        if let Some(handle) = self.background_task.lock().await.take() {
            debug!("[Sync] Stopping background loop");
            handle.abort();
        }
    }

    pub async fn is_background_running(&self) -> bool {
        self.background_task
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        if let Some(handle) = self.background_task.get_mut().take() {
            handle.abort();
        }
    }
}
