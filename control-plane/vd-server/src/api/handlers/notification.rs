use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, response::IntoResponse};
use serde_json::json;
use tracing::error;

use vd_models::{CreateWebhookRequest, UpdateWebhookRequest, WebhookConfig};

use crate::errors::ApiError;
use crate::server::AppState;

pub async fn list_webhooks(
    State(state): State<AppState>,
) -> Result<Json<Vec<WebhookConfig>>, ApiError> {
    let webhooks = state.notifier.store().list().await.map_err(|err| {
        error!(error = %err, "Failed to list webhooks");
        ApiError::from(err)
    })?;
    Ok(Json(webhooks))
}

pub async fn create_webhook(
    State(state): State<AppState>,
    Json(req): Json<CreateWebhookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    if req.url.is_empty() {
        return Err(ApiError::BadRequest("url is required".to_string()));
    }

    let webhook = state.notifier.store().create(req).await.map_err(|err| {
        error!(error = %err, "Failed to create webhook");
        ApiError::from(err)
    })?;
    Ok((StatusCode::CREATED, Json(webhook)))
}

pub async fn update_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateWebhookRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .notifier
        .store()
        .update(&id, req)
        .await
        .map_err(|err| {
            error!(id = %id, error = %err, "Failed to update webhook");
            ApiError::from(err)
        })?;
    Ok(Json(json!({ "message": "Webhook updated successfully" })))
}

pub async fn delete_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.notifier.store().delete(&id).await.map_err(|err| {
        error!(id = %id, error = %err, "Failed to delete webhook");
        ApiError::from(err)
    })?;
    Ok(Json(json!({ "message": "Webhook deleted successfully" })))
}

/// Fires the fixed test payload at the webhook, bypassing rule evaluation.
pub async fn test_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.notifier.send_test(&id).await.map_err(|err| {
        error!(id = %id, error = %err, "Test notification failed");
        match err {
            crate::notify::NotifyError::Store(store) => ApiError::from(store),
            other => ApiError::InternalServerError(other.to_string()),
        }
    })?;
    Ok(Json(json!({ "message": "Test notification sent" })))
}
