//! Online/offline signal and the background loop that turns it into sync runs.

use std::sync::{Arc, Weak};

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::facade::SyncClient;
use super::scheduler::SyncConfig;

/// Tracks whether the runtime believes the remote system is reachable.
///
/// Cloning is cheap; every clone observes the same signal.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Records the current connectivity. Returns true when this was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            info!(
                "[Connectivity] Transitioned {}",
                if online { "online" } else { "offline" }
            );
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Drives sync runs from connectivity transitions and the periodic timers.
///
/// Holds the client weakly. Stops when the client is dropped, the connectivity
/// sender closes or the task is aborted.
pub(crate) async fn run_connectivity_loop(
    client: Weak<SyncClient>,
    config: SyncConfig,
    mut online_rx: watch::Receiver<bool>,
) {
    let mut sync_tick = interval_at(Instant::now() + config.sync_interval, config.sync_interval);
    sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sweep_tick = interval_at(
        Instant::now() + config.cache_sweep_interval,
        config.cache_sweep_interval,
    );
    sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = online_rx.changed() => {
                if changed.is_err() {
                    debug!("[Connectivity] Signal closed. Stopping background loop.");
                    break;
                }
                let online = *online_rx.borrow_and_update();
                let Some(client) = client.upgrade() else { break };
                if online {
                    client.clear_error();
                    let result = client.engine().run().await;
                    debug!("[Connectivity] Online sync finished status={:?}", result.status);
                } else {
                    debug!("[Connectivity] Offline. New runs suspended.");
                }
            }
            _ = sync_tick.tick() => {
                let Some(client) = client.upgrade() else { break };
                if client.connectivity().is_online() {
                    let result = client.engine().run().await;
                    debug!("[Connectivity] Periodic sync finished status={:?}", result.status);
                }
            }
            _ = sweep_tick.tick() => {
                let Some(client) = client.upgrade() else { break };
                match client.store().clear_expired_cache().await {
                    Ok(removed) if removed > 0 => {
                        debug!("[Connectivity] Swept {} expired cache entries", removed);
                    }
                    Ok(_) => {}
                    Err(err) => warn!("[Connectivity] Cache sweep failed: {}", err),
                }
            }
        }
    }
    debug!("[Connectivity] Background loop stopped");
}
