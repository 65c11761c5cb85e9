use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, response::IntoResponse};
use serde_json::json;
use tracing::error;

use vd_models::{
    BackupStorageLocationResponse, CreateBackupStorageLocationRequest,
    CreateVolumeSnapshotLocationRequest, UpdateBackupStorageLocationRequest,
    UpdateVolumeSnapshotLocationRequest, VolumeSnapshotLocationResponse,
};

use super::{ClusterQuery, select_client};
use crate::errors::ApiError;
use crate::server::AppState;

pub async fn backup_locations(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<Vec<BackupStorageLocationResponse>>, ApiError> {
    if query.wants_all() {
        return Ok(Json(state.aggregator.all_backup_storage_locations().await));
    }

    let client = select_client(&state, &query).await?;
    let locations = client
        .list_backup_storage_locations()
        .await
        .map_err(|err| {
            error!(error = %err, "Failed to list backup storage locations");
            ApiError::from(err)
        })?;
    Ok(Json(locations))
}

fn validate_bsl_request(req: &CreateBackupStorageLocationRequest) -> Result<(), ApiError> {
    if req.name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }
    if req.provider.is_empty() {
        return Err(ApiError::BadRequest("Provider is required".to_string()));
    }
    if req.bucket.is_empty() {
        return Err(ApiError::BadRequest("Bucket is required".to_string()));
    }

    match req.provider.as_str() {
        "aws" | "velero.io/aws" => {
            if req.region.is_empty() && req.s3_url.is_empty() {
                return Err(ApiError::BadRequest(
                    "Region or S3 URL is required for AWS provider".to_string(),
                ));
            }
        }
        "azure" | "velero.io/azure" => {
            if req.storage_account.is_empty() || req.resource_group.is_empty() {
                return Err(ApiError::BadRequest(
                    "Storage account and resource group are required for Azure provider"
                        .to_string(),
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

pub async fn create_backup_location(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
    Json(req): Json<CreateBackupStorageLocationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_bsl_request(&req)?;

    let client = select_client(&state, &query).await?;
    let location = client
        .create_backup_storage_location(req)
        .await
        .map_err(|err| {
            error!(error = %err, "Failed to create backup storage location");
            ApiError::from(err)
        })?;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn update_backup_location(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClusterQuery>,
    Json(req): Json<UpdateBackupStorageLocationRequest>,
) -> Result<Json<BackupStorageLocationResponse>, ApiError> {
    let client = select_client(&state, &query).await?;
    let location = client
        .update_backup_storage_location(&name, req)
        .await
        .map_err(|err| {
            error!(name = %name, error = %err, "Failed to update backup storage location");
            ApiError::from(err)
        })?;
    Ok(Json(location))
}

pub async fn delete_backup_location(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let client = select_client(&state, &query).await?;
    client
        .delete_backup_storage_location(&name)
        .await
        .map_err(|err| {
            error!(name = %name, error = %err, "Failed to delete backup storage location");
            ApiError::from(err)
        })?;
    Ok(Json(json!({ "message": "Backup storage location deleted" })))
}

pub async fn snapshot_locations(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<Vec<VolumeSnapshotLocationResponse>>, ApiError> {
    if query.wants_all() {
        return Ok(Json(state.aggregator.all_volume_snapshot_locations().await));
    }

    let client = select_client(&state, &query).await?;
    let locations = client
        .list_volume_snapshot_locations()
        .await
        .map_err(|err| {
            error!(error = %err, "Failed to list volume snapshot locations");
            ApiError::from(err)
        })?;
    Ok(Json(locations))
}

pub async fn create_snapshot_location(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
    Json(req): Json<CreateVolumeSnapshotLocationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }
    if req.provider.is_empty() {
        return Err(ApiError::BadRequest("Provider is required".to_string()));
    }

    let client = select_client(&state, &query).await?;
    let location = client
        .create_volume_snapshot_location(req)
        .await
        .map_err(|err| {
            error!(error = %err, "Failed to create volume snapshot location");
            ApiError::from(err)
        })?;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn update_snapshot_location(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClusterQuery>,
    Json(req): Json<UpdateVolumeSnapshotLocationRequest>,
) -> Result<Json<VolumeSnapshotLocationResponse>, ApiError> {
    let client = select_client(&state, &query).await?;
    let location = client
        .update_volume_snapshot_location(&name, req)
        .await
        .map_err(|err| {
            error!(name = %name, error = %err, "Failed to update volume snapshot location");
            ApiError::from(err)
        })?;
    Ok(Json(location))
}

pub async fn delete_snapshot_location(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let client = select_client(&state, &query).await?;
    client
        .delete_volume_snapshot_location(&name)
        .await
        .map_err(|err| {
            error!(name = %name, error = %err, "Failed to delete volume snapshot location");
            ApiError::from(err)
        })?;
    Ok(Json(json!({ "message": "Volume snapshot location deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_requires_region_or_s3_url() {
        let mut req = CreateBackupStorageLocationRequest {
            name: "primary".into(),
            provider: "aws".into(),
            bucket: "backups".into(),
            ..Default::default()
        };
        assert!(validate_bsl_request(&req).is_err());

        req.s3_url = "http://minio:9000".into();
        assert!(validate_bsl_request(&req).is_ok());
    }

    #[test]
    fn azure_requires_account_and_resource_group() {
        let mut req = CreateBackupStorageLocationRequest {
            name: "az".into(),
            provider: "azure".into(),
            bucket: "container".into(),
            storage_account: "acct".into(),
            ..Default::default()
        };
        assert!(validate_bsl_request(&req).is_err());

        req.resource_group = "rg".into();
        assert!(validate_bsl_request(&req).is_ok());
    }

    #[test]
    fn gcp_needs_only_the_basics() {
        let req = CreateBackupStorageLocationRequest {
            name: "gcs".into(),
            provider: "gcp".into(),
            bucket: "bkt".into(),
            ..Default::default()
        };
        assert!(validate_bsl_request(&req).is_ok());
    }
}
