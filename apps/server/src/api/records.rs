//! Local records and the outbound mutation API.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use fieldsync_core::sync::LocalRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

#[derive(Debug, Deserialize)]
struct MutationRequest {
    endpoint: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct CreatedResponse {
    id: String,
}

fn require_endpoint(endpoint: &str) -> ApiResult<&str> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ApiError::BadRequest("endpoint is required".to_string()));
    }
    Ok(endpoint)
}

async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
) -> ApiResult<Json<Vec<LocalRecord>>> {
    Ok(Json(state.sync.store().get_records_by_type(&entity_type).await?))
}

async fn get_record(
    State(state): State<Arc<AppState>>,
    Path((entity_type, id)): Path<(String, String)>,
) -> ApiResult<Json<LocalRecord>> {
    state
        .sync
        .store()
        .get_record(&id)
        .await?
        .filter(|record| record.entity_type == entity_type)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{} {} not found", entity_type, id)))
}

async fn create_record(
    State(state): State<Arc<AppState>>,
    Path(entity_type): Path<String>,
    Json(body): Json<MutationRequest>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    let endpoint = require_endpoint(&body.endpoint)?;
    let id = state
        .sync
        .outbox()
        .queue_create(&entity_type, endpoint, body.data)
        .await?;
    debug!("Queued create {} {}", entity_type, id);
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn update_record(
    State(state): State<Arc<AppState>>,
    Path((entity_type, id)): Path<(String, String)>,
    Json(body): Json<MutationRequest>,
) -> ApiResult<StatusCode> {
    let endpoint = require_endpoint(&body.endpoint)?;
    state
        .sync
        .outbox()
        .queue_update(&entity_type, endpoint, &id, body.data)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path((entity_type, id)): Path<(String, String)>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    let endpoint = require_endpoint(&params.endpoint)?;
    state
        .sync
        .outbox()
        .queue_delete(&entity_type, endpoint, &id)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/records/:entity_type", get(list_records).post(create_record))
        .route(
            "/records/:entity_type/:id",
            get(get_record).put(update_record).delete(delete_record),
        )
}
