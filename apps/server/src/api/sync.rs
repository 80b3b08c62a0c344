//! Sync status and manual actions for the presentation layer.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Json, Router,
};
use fieldsync_core::sync::{StorageStats, SyncClientState, SyncRunResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiResult;
use crate::events::{ServerEvent, CONNECTIVITY_CHANGED};
use crate::main_lib::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncStatusResponse {
    #[serde(flatten)]
    state: SyncClientState,
    background_running: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearPendingResponse {
    cleared: usize,
}

#[derive(Debug, Deserialize)]
struct ConnectivityRequest {
    online: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectivityResponse {
    online: bool,
    changed: bool,
}

async fn get_sync_status(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SyncStatusResponse>> {
    let sync_state = state.sync.state().await?;
    Ok(Json(SyncStatusResponse {
        state: sync_state,
        background_running: state.sync.is_background_running().await,
    }))
}

async fn run_sync(State(state): State<Arc<AppState>>) -> Json<SyncRunResult> {
    let result = state.sync.manual_sync().await;
    if result.was_skipped() {
        info!("[Sync] Manual sync skipped: {:?}", result.status);
    } else {
        info!(
            "[Sync] Manual sync {:?}: {}/{} synced, {} failed",
            result.status, result.synced, result.total, result.failed
        );
    }
    Json(result)
}

async fn clear_pending(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ClearPendingResponse>> {
    let cleared = state.sync.clear_pending().await?;
    info!("[Sync] Cleared {} pending changes", cleared);
    Ok(Json(ClearPendingResponse { cleared }))
}

async fn get_storage_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<StorageStats>> {
    Ok(Json(state.sync.get_storage_stats().await?))
}

async fn set_connectivity(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ConnectivityRequest>,
) -> Json<ConnectivityResponse> {
    let changed = state.sync.set_online(body.online);
    if changed {
        state.event_bus.publish(ServerEvent::with_payload(
            CONNECTIVITY_CHANGED,
            serde_json::json!({ "online": body.online }),
        ));
    }
    Json(ConnectivityResponse {
        online: body.online,
        changed,
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync/status", get(get_sync_status))
        .route("/sync/run", post(run_sync))
        .route("/sync/pending", delete(clear_pending))
        .route("/sync/stats", get(get_storage_stats))
        .route("/sync/connectivity", put(set_connectivity))
}
