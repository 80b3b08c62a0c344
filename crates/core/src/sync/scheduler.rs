//! Sync cadence constants and runtime configuration.

use std::time::Duration;

/// Periodic sync cadence while online, in seconds.
pub const SYNC_INTERVAL_SECS: u64 = 5 * 60;

/// Failed dispatch attempts after which a queue item is dropped.
pub const SYNC_MAX_RETRIES: u32 = 3;

/// Cadence of the expired-cache sweep, in seconds.
pub const CACHE_SWEEP_INTERVAL_SECS: u64 = 15 * 60;

/// Runtime knobs for the sync engine and its background loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub max_retries: u32,
    pub sync_interval: Duration,
    pub cache_sweep_interval: Duration,
    /// Check connectivity before each dispatch and end the run early when offline.
    pub stop_when_offline: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: SYNC_MAX_RETRIES,
            sync_interval: Duration::from_secs(SYNC_INTERVAL_SECS),
            cache_sweep_interval: Duration::from_secs(CACHE_SWEEP_INTERVAL_SECS),
            stop_when_offline: false,
        }
    }
}

impl SyncConfig {
    /// Reads `FIELDSYNC_*` overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Missing or malformed
    /// values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let max_retries = read("FIELDSYNC_MAX_RETRIES")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.max_retries);
        let sync_interval = read("FIELDSYNC_SYNC_INTERVAL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.sync_interval);
        let cache_sweep_interval = read("FIELDSYNC_CACHE_SWEEP_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_sweep_interval);
        let stop_when_offline = read("FIELDSYNC_STOP_WHEN_OFFLINE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.stop_when_offline);

        Self {
            max_retries,
            sync_interval,
            cache_sweep_interval,
            stop_when_offline,
        }
    }
}
