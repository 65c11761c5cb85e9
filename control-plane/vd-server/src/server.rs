use std::sync::Arc;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers;
use crate::api::middleware::{cors_layer, track_metrics};
use crate::auth;
use crate::cluster::ClusterManager;
use crate::config::{AuthConfig, ServerConfig};
use crate::hub::Hub;
use crate::metrics::metrics_handler;
use crate::notify::Notifier;
use crate::services::Aggregator;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ClusterManager>,
    pub aggregator: Arc<Aggregator>,
    pub hub: Arc<Hub>,
    pub notifier: Notifier,
    pub auth: Arc<AuthConfig>,
}

pub struct ApiServer {
    app: Router,
    config: ServerConfig,
}

impl ApiServer {
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        crate::metrics::register_metrics();

        // Public routes: health, metrics, auth discovery and the event socket.
        let public = Router::new()
            .route("/healthz", get(handlers::healthz))
            .route("/metrics", get(metrics_handler))
            .route("/api/auth/config", get(handlers::auth_config))
            .route("/ws", get(handlers::ws::websocket));

        // Viewer routes: any authenticated user.
        let viewer = Router::new()
            .route("/api/dashboard/stats", get(handlers::dashboard::stats))
            .route("/api/backups", get(handlers::backup::list))
            .route("/api/backups/compare", get(handlers::backup::compare))
            .route(
                "/api/backups/shared",
                get(handlers::cross_cluster::shared_backups),
            )
            .route("/api/backups/{name}", get(handlers::backup::get))
            .route("/api/backups/{name}/logs", get(handlers::backup::logs))
            .route("/api/restores", get(handlers::restore::list))
            .route("/api/restores/{name}", get(handlers::restore::get))
            .route("/api/schedules", get(handlers::schedule::list))
            .route("/api/schedules/{name}", get(handlers::schedule::get))
            .route(
                "/api/settings/backup-locations",
                get(handlers::settings::backup_locations),
            )
            .route(
                "/api/settings/snapshot-locations",
                get(handlers::settings::snapshot_locations),
            );

        // Operator routes: resource mutations on target clusters.
        let operator = Router::new()
            .route("/api/backups", post(handlers::backup::create))
            .route("/api/backups/{name}", delete(handlers::backup::delete))
            .route("/api/restores", post(handlers::restore::create))
            .route("/api/restores/{name}", delete(handlers::restore::delete))
            .route(
                "/api/restores/cross-cluster",
                post(handlers::cross_cluster::create_restore),
            )
            .route("/api/schedules", post(handlers::schedule::create))
            .route(
                "/api/schedules/{name}",
                patch(handlers::schedule::toggle_pause).delete(handlers::schedule::delete),
            )
            .route_layer(from_fn(auth::require_operator));

        // Admin routes: cluster registry, webhooks, storage locations.
        let admin = Router::new()
            .route(
                "/api/clusters",
                get(handlers::cluster::list).post(handlers::cluster::create),
            )
            .route(
                "/api/clusters/{id}",
                get(handlers::cluster::get)
                    .patch(handlers::cluster::update)
                    .delete(handlers::cluster::delete),
            )
            .route(
                "/api/notifications/webhooks",
                get(handlers::notification::list_webhooks)
                    .post(handlers::notification::create_webhook),
            )
            .route(
                "/api/notifications/webhooks/{id}",
                patch(handlers::notification::update_webhook)
                    .delete(handlers::notification::delete_webhook),
            )
            .route(
                "/api/notifications/webhooks/{id}/test",
                post(handlers::notification::test_webhook),
            )
            .route(
                "/api/settings/backup-locations",
                post(handlers::settings::create_backup_location),
            )
            .route(
                "/api/settings/backup-locations/{name}",
                patch(handlers::settings::update_backup_location)
                    .delete(handlers::settings::delete_backup_location),
            )
            .route(
                "/api/settings/snapshot-locations",
                post(handlers::settings::create_snapshot_location),
            )
            .route(
                "/api/settings/snapshot-locations/{name}",
                patch(handlers::settings::update_snapshot_location)
                    .delete(handlers::settings::delete_snapshot_location),
            )
            .route_layer(from_fn(auth::require_admin));

        let protected = Router::new()
            .merge(viewer)
            .merge(operator)
            .merge(admin)
            .layer(from_fn_with_state(state.clone(), auth::authenticate));

        let app = Router::new()
            .merge(public)
            .merge(protected)
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.allowed_origins))
            .layer(from_fn(track_metrics))
            .with_state(state);

        Self { app, config }
    }

    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind(self.config.address()).await?;

        info!(address = %self.config.address(), "Velero Dashboard API listening");
        axum::serve(listener, self.app).await?;

        Ok(())
    }

    /// Consume and return the underlying Router so callers can serve it
    /// themselves (e.g., on an ephemeral port in tests).
    pub fn into_router(self) -> Router {
        self.app
    }
}
