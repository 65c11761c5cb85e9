use thiserror::Error;
use vd_store::StoreError;

/// Errors from cluster connection management and target-cluster operations.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("cluster not found or not connected: {0}")]
    NotConnected(String),

    #[error("no default cluster configured")]
    NoDefaultCluster,

    #[error("cluster already connected")]
    AlreadyConnected,

    #[error("failed to build client: {0}")]
    ClientBuild(String),

    #[error("connection test failed: {0}")]
    ConnectionFailed(String),

    #[error("upstream error: {0}")]
    Upstream(#[from] kube::Error),

    #[error("log download failed: {0}")]
    LogDownload(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// HTTP-facing error with a fixed `{"error": …}` body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::{Json, http::StatusCode};
        use serde_json::json;

        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::DuplicateName(name) => ApiError::Conflict(format!("already exists: {name}")),
            StoreError::Configuration(msg) => ApiError::BadRequest(msg),
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}

impl From<ClusterError> for ApiError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::NotConnected(_) | ClusterError::NoDefaultCluster => {
                ApiError::BadRequest("Cluster not found or not connected".to_string())
            }
            ClusterError::Store(store) => store.into(),
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}
