pub mod backup;
pub mod cluster;
pub mod cross_cluster;
pub mod dashboard;
pub mod notification;
pub mod restore;
pub mod schedule;
pub mod settings;
pub mod ws;

use serde::Deserialize;

use crate::cluster::VeleroClient;
use crate::errors::ApiError;
use crate::server::AppState;

/// Every resource read/write takes an optional `?cluster=<id>`;
/// `?cluster=all` routes reads through the aggregator, no parameter means
/// the default cluster.
#[derive(Debug, Default, Deserialize)]
pub struct ClusterQuery {
    pub cluster: Option<String>,
}

pub const ALL_CLUSTERS: &str = "all";

impl ClusterQuery {
    pub fn wants_all(&self) -> bool {
        self.cluster.as_deref() == Some(ALL_CLUSTERS)
    }
}

pub async fn select_client(
    state: &AppState,
    query: &ClusterQuery,
) -> Result<VeleroClient, ApiError> {
    match query.cluster.as_deref() {
        Some(id) if !id.is_empty() && id != ALL_CLUSTERS => {
            Ok(state.manager.get_client(id).await?)
        }
        _ => Ok(state.manager.get_default_client().await?),
    }
}

pub async fn auth_config(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "mode": state.auth.mode.as_str() }))
}

pub async fn healthz() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
