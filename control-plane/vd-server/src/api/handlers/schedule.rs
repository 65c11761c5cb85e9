use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, response::IntoResponse};
use serde_json::json;
use tracing::error;

use vd_models::{CreateScheduleRequest, ScheduleResponse};

use super::{ClusterQuery, select_client};
use crate::errors::ApiError;
use crate::server::AppState;

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<Vec<ScheduleResponse>>, ApiError> {
    if query.wants_all() {
        return Ok(Json(state.aggregator.all_schedules().await));
    }

    let client = select_client(&state, &query).await?;
    let schedules = client.list_schedules().await.map_err(|err| {
        error!(error = %err, "Failed to list schedules");
        ApiError::from(err)
    })?;
    Ok(Json(schedules))
}

pub async fn get(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let client = select_client(&state, &query).await?;
    match client.get_schedule(&name).await {
        Ok(schedule) => Ok(Json(schedule)),
        Err(err) => {
            error!(name = %name, error = %err, "Failed to get schedule");
            Err(ApiError::NotFound(err.to_string()))
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    if req.schedule.is_empty() {
        return Err(ApiError::BadRequest("schedule is required".to_string()));
    }

    let client = select_client(&state, &query).await?;
    let schedule = client.create_schedule(req).await.map_err(|err| {
        error!(error = %err, "Failed to create schedule");
        ApiError::from(err)
    })?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn toggle_pause(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let client = select_client(&state, &query).await?;
    let schedule = client.toggle_schedule_pause(&name).await.map_err(|err| {
        error!(name = %name, error = %err, "Failed to toggle schedule pause");
        ApiError::from(err)
    })?;
    Ok(Json(schedule))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let client = select_client(&state, &query).await?;
    client.delete_schedule(&name).await.map_err(|err| {
        error!(name = %name, error = %err, "Failed to delete schedule");
        ApiError::from(err)
    })?;
    Ok(Json(json!({ "message": "Schedule deleted successfully" })))
}
