use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use vd_models::{BackupComparisonResponse, BackupResponse, CreateBackupRequest};

use super::{ClusterQuery, select_client};
use crate::errors::ApiError;
use crate::server::AppState;

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<Vec<BackupResponse>>, ApiError> {
    if query.wants_all() {
        return Ok(Json(state.aggregator.all_backups().await));
    }

    let client = select_client(&state, &query).await?;
    let backups = client.list_backups().await.map_err(|err| {
        error!(error = %err, "Failed to list backups");
        ApiError::from(err)
    })?;
    Ok(Json(backups))
}

pub async fn get(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<BackupResponse>, ApiError> {
    let client = select_client(&state, &query).await?;
    match client.get_backup(&name).await {
        Ok(backup) => Ok(Json(backup)),
        Err(err) => {
            error!(name = %name, error = %err, "Failed to get backup");
            Err(ApiError::NotFound(err.to_string()))
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
    Json(req): Json<CreateBackupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }

    let client = select_client(&state, &query).await?;
    let backup = client.create_backup(req).await.map_err(|err| {
        error!(error = %err, "Failed to create backup");
        ApiError::from(err)
    })?;
    Ok((StatusCode::CREATED, Json(backup)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let client = select_client(&state, &query).await?;
    client.delete_backup(&name).await.map_err(|err| {
        error!(name = %name, error = %err, "Failed to delete backup");
        ApiError::from(err)
    })?;
    Ok(Json(json!({ "message": "delete request created" })))
}

pub async fn logs(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClusterQuery>,
) -> Result<String, ApiError> {
    let client = select_client(&state, &query).await?;
    client.backup_logs(&name).await.map_err(|err| {
        error!(name = %name, error = %err, "Failed to get backup logs");
        ApiError::from(err)
    })
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub cluster: Option<String>,
    #[serde(default)]
    pub backup1: String,
    #[serde(default)]
    pub backup2: String,
}

pub async fn compare(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<BackupComparisonResponse>, ApiError> {
    if query.backup1.is_empty() || query.backup2.is_empty() {
        return Err(ApiError::BadRequest(
            "backup1 and backup2 query parameters are required".to_string(),
        ));
    }

    let cluster_query = ClusterQuery {
        cluster: query.cluster.clone(),
    };
    let client = select_client(&state, &cluster_query).await?;
    let comparison = client
        .compare_backups(&query.backup1, &query.backup2)
        .await
        .map_err(|err| {
            error!(
                backup1 = %query.backup1,
                backup2 = %query.backup2,
                error = %err,
                "Failed to compare backups"
            );
            ApiError::from(err)
        })?;
    Ok(Json(comparison))
}
