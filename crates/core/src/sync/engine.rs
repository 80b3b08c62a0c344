//! Sync engine: drains the queue in creation order with bounded retry and conflict detection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

use super::connectivity::ConnectivityMonitor;
use super::dispatch::{DispatchRequest, RemoteDispatcher};
use super::events::{SyncEvent, SyncEventBus};
use super::model::SyncQueueItem;
use super::scheduler::SyncConfig;
use super::store::{LocalStore, LAST_SYNC_AT_KEY};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    /// Every queued item was attempted.
    Completed,
    /// Connectivity dropped mid-run and `stop_when_offline` is set.
    Interrupted,
    SkippedOffline,
    /// Another run was already in progress.
    SkippedBusy,
    /// A storage failure ended the run early.
    Aborted,
}

/// Aggregate outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunResult {
    pub status: SyncRunStatus,
    pub total: usize,
    pub synced: usize,
    /// Items whose dispatch failed this run, whether deferred or dropped.
    pub failed: usize,
    /// Failed items removed after exhausting their retries.
    pub dropped: usize,
    pub conflicts: usize,
    pub error: Option<String>,
}

impl SyncRunResult {
    fn skipped(status: SyncRunStatus) -> Self {
        Self {
            status,
            total: 0,
            synced: 0,
            failed: 0,
            dropped: 0,
            conflicts: 0,
            error: None,
        }
    }

    pub fn success(&self) -> bool {
        self.status == SyncRunStatus::Completed && self.failed == 0
    }

    pub fn was_skipped(&self) -> bool {
        matches!(
            self.status,
            SyncRunStatus::SkippedOffline | SyncRunStatus::SkippedBusy
        )
    }
}

#[derive(Debug, Default)]
struct RunTally {
    total: usize,
    synced: usize,
    failed: usize,
    dropped: usize,
    conflicts: usize,
}

impl RunTally {
    fn finish(self, status: SyncRunStatus, error: Option<String>) -> SyncRunResult {
        SyncRunResult {
            status,
            total: self.total,
            synced: self.synced,
            failed: self.failed,
            dropped: self.dropped,
            conflicts: self.conflicts,
            error,
        }
    }
}

/// Clears the running flag however the run ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncEngine {
    store: Arc<dyn LocalStore>,
    dispatcher: Arc<dyn RemoteDispatcher>,
    connectivity: ConnectivityMonitor,
    events: Arc<SyncEventBus>,
    config: SyncConfig,
    syncing: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn LocalStore>,
        dispatcher: Arc<dyn RemoteDispatcher>,
        connectivity: ConnectivityMonitor,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            connectivity,
            events: Arc::new(SyncEventBus::new()),
            config,
            syncing: AtomicBool::new(false),
        }
    }

    pub fn events(&self) -> Arc<SyncEventBus> {
        Arc::clone(&self.events)
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Drops every queued item. Local records keep their status.
    pub async fn clear_pending(&self) -> Result<usize> {
        let removed = self.store.clear_sync_queue().await?;
        info!("[Sync] Cleared {} pending queue items", removed);
        Ok(removed)
    }

    /// Runs one drain of the sync queue.
    ///
    /// Returns immediately when offline or when another run holds the guard;
    /// such requests are dropped, not deferred.
    pub async fn run(&self) -> SyncRunResult {
        if !self.connectivity.is_online() {
            debug!("[Sync] Offline. Skipping run.");
            return SyncRunResult::skipped(SyncRunStatus::SkippedOffline);
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("[Sync] Run already in progress. Dropping request.");
            return SyncRunResult::skipped(SyncRunStatus::SkippedBusy);
        }
        let _guard = RunGuard(&self.syncing);
        let started_at = std::time::Instant::now();

        self.events.emit(&SyncEvent::Start);

        let mut tally = RunTally::default();
        match self.drain(&mut tally).await {
            Ok(status) => {
                info!(
                    "[Sync] Run {:?} total={} synced={} failed={} dropped={} conflicts={} duration_ms={}",
                    status,
                    tally.total,
                    tally.synced,
                    tally.failed,
                    tally.dropped,
                    tally.conflicts,
                    started_at.elapsed().as_millis()
                );
                tally.finish(status, None)
            }
            Err(err) => {
                let message = err.to_string();
                error!("[Sync] Run aborted: {}", message);
                self.events.emit(&SyncEvent::Error {
                    message: message.clone(),
                });
                tally.finish(SyncRunStatus::Aborted, Some(message))
            }
        }
    }

    async fn drain(&self, tally: &mut RunTally) -> Result<SyncRunStatus> {
        let mut queue = self.store.get_sync_queue().await?;
        tally.total = queue.len();

        // Stable sort: equal timestamps keep the store's id order.
        queue.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut status = SyncRunStatus::Completed;
        for item in queue {
            self.events.emit(&SyncEvent::Progress {
                synced: tally.synced,
                total: tally.total,
            });
            if self.config.stop_when_offline && !self.connectivity.is_online() {
                warn!("[Sync] Connectivity lost mid-run. Leaving remaining items queued.");
                status = SyncRunStatus::Interrupted;
                break;
            }
            self.process_item(item, tally).await?;
        }

        if status == SyncRunStatus::Completed && tally.failed == 0 {
            self.store
                .set_metadata(
                    LAST_SYNC_AT_KEY,
                    serde_json::Value::String(Utc::now().to_rfc3339()),
                )
                .await?;
        }

        self.events.emit(&SyncEvent::Complete {
            synced: tally.synced,
            total: tally.total,
            failed: tally.failed,
            conflicts: tally.conflicts,
        });
        Ok(status)
    }

    async fn process_item(&self, item: SyncQueueItem, tally: &mut RunTally) -> Result<()> {
        let request = DispatchRequest::from_item(&item);
        debug!(
            "[Sync] Dispatching {} {} item={} retries={}",
            request.method.as_str(),
            request.endpoint,
            item.id,
            item.retries
        );

        match self.dispatcher.dispatch(request).await {
            Ok(()) => {
                self.store.remove_sync_item(&item.id).await?;
                if let Some(record_id) = item.record_id() {
                    self.store.mark_synced(&record_id).await?;
                }
                tally.synced += 1;
            }
            Err(err) if err.is_conflict() => {
                warn!(
                    "[Sync] Conflict for item={} endpoint={}: {}",
                    item.id, item.endpoint, err
                );
                self.store.remove_sync_item(&item.id).await?;
                if let Some(record_id) = item.record_id() {
                    self.store.mark_conflict(&record_id).await?;
                }
                tally.conflicts += 1;
            }
            Err(err) => {
                tally.failed += 1;
                let attempts = item.retries.saturating_add(1);
                if attempts >= self.config.max_retries {
                    warn!(
                        "[Sync] Dropping item={} after {} failed attempts: {}",
                        item.id, attempts, err
                    );
                    self.store.remove_sync_item(&item.id).await?;
                    tally.dropped += 1;
                } else {
                    warn!(
                        "[Sync] Dispatch failed for item={} (attempt {}/{}): {}",
                        item.id, attempts, self.config.max_retries, err
                    );
                    self.store.increment_retry(&item.id).await?;
                }
            }
        }
        Ok(())
    }
}
