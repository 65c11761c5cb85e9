use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, response::IntoResponse};
use serde_json::json;
use tracing::{error, info, warn};

use vd_models::{ClusterSummary, CreateClusterRequest, UpdateClusterRequest};

use crate::cluster::kubeconfig::token_to_kubeconfig;
use crate::errors::ApiError;
use crate::server::AppState;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ClusterSummary>>, ApiError> {
    let clusters = state.manager.list_clusters().await.map_err(|err| {
        error!(error = %err, "Failed to list clusters");
        ApiError::InternalServerError("Failed to list clusters".to_string())
    })?;
    Ok(Json(clusters))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClusterSummary>, ApiError> {
    let record = state.manager.store().get(&id).await.map_err(|err| {
        error!(id = %id, error = %err, "Failed to get cluster");
        ApiError::NotFound("Cluster not found".to_string())
    })?;
    Ok(Json(record.to_summary()))
}

pub async fn create(
    State(state): State<AppState>,
    Json(mut req): Json<CreateClusterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.is_empty() {
        return Err(ApiError::BadRequest("Cluster name is required".to_string()));
    }
    if req.namespace.is_empty() {
        return Err(ApiError::BadRequest("Namespace is required".to_string()));
    }

    let has_kubeconfig = !req.kubeconfig.is_empty();
    let has_token_auth = !req.api_server.is_empty() && !req.token.is_empty();
    if !has_kubeconfig && !has_token_auth {
        return Err(ApiError::BadRequest(
            "Either kubeconfig or (apiServer + token) is required".to_string(),
        ));
    }

    if has_token_auth && !has_kubeconfig {
        req.kubeconfig = token_to_kubeconfig(
            &req.name,
            &req.api_server,
            &req.token,
            &req.ca_cert,
            req.insecure_skip_tls,
        );
        info!(name = %req.name, api_server = %req.api_server, "Converted token-based auth to kubeconfig");
    }

    let record = state.manager.store().create(req).await.map_err(|err| {
        error!(error = %err, "Failed to create cluster");
        ApiError::from(err)
    })?;
    info!(id = %record.id, name = %record.name, "Cluster created");

    // Connect asynchronously so the API response does not wait out the
    // connection probe.
    let summary = record.to_summary();
    let manager = state.manager.clone();
    tokio::spawn(async move {
        if let Err(err) = manager.add_cluster(record).await {
            error!(error = %err, "Failed to connect to cluster");
        }
    });

    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateClusterRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let kubeconfig_changed = req.kubeconfig.is_some();

    state.manager.store().update(&id, req).await.map_err(|err| {
        error!(id = %id, error = %err, "Failed to update cluster");
        ApiError::from(err)
    })?;
    info!(id = %id, "Cluster updated");

    if kubeconfig_changed {
        let manager = state.manager.clone();
        let id = id.clone();
        tokio::spawn(async move {
            let _ = manager.remove_cluster(&id).await;
            match manager.store().get(&id).await {
                Ok(record) => {
                    if let Err(err) = manager.add_cluster(record).await {
                        error!(id = %id, error = %err, "Failed to reconnect cluster");
                    }
                }
                Err(err) => error!(id = %id, error = %err, "Failed to reload cluster"),
            }
        });
    }

    Ok(Json(json!({ "message": "Cluster updated successfully" })))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Err(err) = state.manager.remove_cluster(&id).await {
        warn!(id = %id, error = %err, "Failed to remove cluster from manager");
    }

    state.manager.store().delete(&id).await.map_err(|err| {
        error!(id = %id, error = %err, "Failed to delete cluster");
        ApiError::from(err)
    })?;
    info!(id = %id, "Cluster deleted");

    Ok(Json(json!({ "message": "Cluster deleted successfully" })))
}
