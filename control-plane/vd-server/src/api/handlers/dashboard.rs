use axum::Json;
use axum::extract::{Query, State};
use tracing::error;

use vd_models::DashboardStats;

use super::{ClusterQuery, select_client};
use crate::errors::ApiError;
use crate::server::AppState;

pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<DashboardStats>, ApiError> {
    if query.wants_all() {
        return Ok(Json(state.aggregator.stats().await));
    }

    let client = select_client(&state, &query).await?;
    let stats = client.dashboard_stats().await.map_err(|err| {
        error!(error = %err, "Failed to get dashboard stats");
        ApiError::from(err)
    })?;
    Ok(Json(stats))
}
