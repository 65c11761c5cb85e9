use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, response::IntoResponse};
use tracing::{error, info};

use vd_models::{CrossClusterBackup, CrossClusterRestoreRequest};

use crate::errors::ApiError;
use crate::server::AppState;
use crate::services::aggregator::has_matching_bsl;

pub async fn shared_backups(
    State(state): State<AppState>,
) -> Result<Json<Vec<CrossClusterBackup>>, ApiError> {
    Ok(Json(state.aggregator.shared_backups().await))
}

/// Creates a restore on the target cluster from a backup that lives on the
/// source cluster's shared storage location.
pub async fn create_restore(
    State(state): State<AppState>,
    Json(req): Json<CrossClusterRestoreRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.source_cluster_id.is_empty() || req.target_cluster_id.is_empty() {
        return Err(ApiError::BadRequest(
            "sourceClusterId and targetClusterId are required".to_string(),
        ));
    }
    if req.restore.backup_name.is_empty() {
        return Err(ApiError::BadRequest("backupName is required".to_string()));
    }
    if req.source_cluster_id == req.target_cluster_id {
        return Err(ApiError::BadRequest(
            "source and target clusters must be different".to_string(),
        ));
    }

    let source_client = state
        .manager
        .get_client(&req.source_cluster_id)
        .await
        .map_err(|_| {
            ApiError::BadRequest("source cluster not found or not connected".to_string())
        })?;
    let target_client = state
        .manager
        .get_client(&req.target_cluster_id)
        .await
        .map_err(|_| {
            ApiError::BadRequest("target cluster not found or not connected".to_string())
        })?;

    let backup = source_client
        .get_backup(&req.restore.backup_name)
        .await
        .map_err(|_| {
            ApiError::NotFound(format!(
                "backup {} not found on source cluster",
                req.restore.backup_name
            ))
        })?;

    let source_bsls = source_client
        .list_backup_storage_locations()
        .await
        .map_err(|_| ApiError::InternalServerError("failed to list source BSLs".to_string()))?;
    let target_bsls = target_client
        .list_backup_storage_locations()
        .await
        .map_err(|_| ApiError::InternalServerError("failed to list target BSLs".to_string()))?;

    let source_bsl = source_bsls
        .iter()
        .find(|bsl| bsl.name == backup.storage_location)
        .ok_or_else(|| {
            ApiError::BadRequest("backup storage location not found on source cluster".to_string())
        })?;

    if !has_matching_bsl(source_bsl, &target_bsls) {
        return Err(ApiError::BadRequest(
            "target cluster does not have a BSL pointing to the same storage as the source backup"
                .to_string(),
        ));
    }

    let restore = target_client
        .create_restore(req.restore.clone())
        .await
        .map_err(|err| {
            error!(
                source = %req.source_cluster_id,
                target = %req.target_cluster_id,
                backup = %req.restore.backup_name,
                error = %err,
                "Failed to create cross-cluster restore"
            );
            ApiError::InternalServerError(format!("failed to create restore: {err}"))
        })?;

    info!(
        source = %req.source_cluster_id,
        target = %req.target_cluster_id,
        backup = %req.restore.backup_name,
        restore = %restore.name,
        "Cross-cluster restore created"
    );

    Ok((StatusCode::CREATED, Json(restore)))
}
