use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, response::IntoResponse};
use serde_json::json;
use tracing::error;

use vd_models::{CreateRestoreRequest, RestoreResponse};

use super::{ClusterQuery, select_client};
use crate::errors::ApiError;
use crate::server::AppState;

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<Vec<RestoreResponse>>, ApiError> {
    if query.wants_all() {
        return Ok(Json(state.aggregator.all_restores().await));
    }

    let client = select_client(&state, &query).await?;
    let restores = client.list_restores().await.map_err(|err| {
        error!(error = %err, "Failed to list restores");
        ApiError::from(err)
    })?;
    Ok(Json(restores))
}

pub async fn get(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<RestoreResponse>, ApiError> {
    let client = select_client(&state, &query).await?;
    match client.get_restore(&name).await {
        Ok(restore) => Ok(Json(restore)),
        Err(err) => {
            error!(name = %name, error = %err, "Failed to get restore");
            Err(ApiError::NotFound(err.to_string()))
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
    Json(req): Json<CreateRestoreRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.backup_name.is_empty() {
        return Err(ApiError::BadRequest("backupName is required".to_string()));
    }

    let client = select_client(&state, &query).await?;
    let restore = client.create_restore(req).await.map_err(|err| {
        error!(error = %err, "Failed to create restore");
        ApiError::from(err)
    })?;
    Ok((StatusCode::CREATED, Json(restore)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let client = select_client(&state, &query).await?;
    client.delete_restore(&name).await.map_err(|err| {
        error!(name = %name, error = %err, "Failed to delete restore");
        ApiError::from(err)
    })?;
    Ok(Json(json!({ "message": "Restore deleted successfully" })))
}
