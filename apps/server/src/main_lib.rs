//! Application state and wiring shared by `main` and the route tests.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use fieldsync_core::sync::{ConnectivityMonitor, LocalStore, RemoteDispatcher, SyncClient};
use fieldsync_remote::{HttpDispatcher, StaticCredentials};
use fieldsync_storage_sqlite::SqliteLocalStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api;
use crate::config::ServerConfig;
use crate::events::{bridge_sync_events, EventBus};

pub struct AppState {
    pub sync: Arc<SyncClient>,
    pub event_bus: EventBus,
}

/// Routes `log` records from the library crates into tracing and installs the subscriber.
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_log::LogTracer::init().context("Failed to bridge log records")?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

pub async fn build_state(config: ServerConfig) -> anyhow::Result<Arc<AppState>> {
    let store = SqliteLocalStore::open(&config.db_dir)
        .with_context(|| format!("Failed to open local store in {}", config.db_dir))?;
    if config.access_token.is_none() {
        warn!("FIELDSYNC_ACCESS_TOKEN is not set; queued changes will fail until it is");
    }
    let credentials = Arc::new(StaticCredentials::new(
        config.access_token.clone(),
        config.company_id.clone(),
    ));
    let dispatcher = HttpDispatcher::new(&config.api_url, credentials)
        .context("Failed to build HTTP client")?;

    let state = assemble_state(
        Arc::new(store),
        Arc::new(dispatcher),
        ConnectivityMonitor::new(config.start_online),
        config,
    );
    state.sync.start_background().await;
    info!("Background sync loop started");
    Ok(state)
}

pub fn assemble_state(
    store: Arc<dyn LocalStore>,
    dispatcher: Arc<dyn RemoteDispatcher>,
    connectivity: ConnectivityMonitor,
    config: ServerConfig,
) -> Arc<AppState> {
    let sync = SyncClient::new(store, dispatcher, connectivity, config.sync);
    let event_bus = EventBus::default();
    bridge_sync_events(&sync, event_bus.clone());
    Arc::new(AppState { sync, event_bus })
}

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api::router())
        .with_state(state)
}
