//! Wires configuration, stores, the manager and the router together.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::{error, info, warn};

use vd_models::CreateClusterRequest;
use vd_store::{ClusterStore, create_cluster_store, create_webhook_store};

use crate::cluster::ClusterManager;
use crate::config::{AppConfig, AuthMode, ServerConfig};
use crate::hub::Hub;
use crate::notify::Notifier;
use crate::server::{ApiServer, AppState};
use crate::services::Aggregator;

pub struct Application {
    pub router: Router,
    pub manager: Arc<ClusterManager>,
    pub notifier: Notifier,
    pub server_config: ServerConfig,
}

pub async fn build_from_env() -> Result<Application> {
    let config = AppConfig::load_from_env().context("failed to load configuration")?;
    build(config).await
}

pub async fn build(config: AppConfig) -> Result<Application> {
    // Unknown storage type or an unreachable back-end is fatal.
    let store_config = config.store().context("invalid cluster store configuration")?;
    let cluster_store = create_cluster_store(&store_config)
        .await
        .context("failed to create cluster store")?;
    let webhook_store = create_webhook_store(&store_config)
        .await
        .context("failed to create notification store")?;

    let notifier = Notifier::new(webhook_store);
    let hub = Hub::new();
    let manager = ClusterManager::new(
        Arc::clone(&cluster_store),
        Arc::clone(&hub),
        Some(Arc::new(notifier.clone())),
    );

    Arc::clone(&manager)
        .start()
        .await
        .context("failed to start cluster manager")?;
    migrate_legacy_kubeconfig(&config, &cluster_store, &manager).await;
    Arc::clone(&manager).start_reconciliation();

    let auth = config.auth();
    if auth.mode != AuthMode::None && auth.jwt_secret.is_empty() {
        warn!("JWT_SECRET not set — bearer tokens cannot be validated");
    }
    info!(mode = auth.mode.as_str(), "Auth mode configured");

    let state = AppState {
        manager: Arc::clone(&manager),
        aggregator: Arc::new(Aggregator::new(Arc::clone(&manager))),
        hub,
        notifier: notifier.clone(),
        auth: Arc::new(auth),
    };

    let server_config = config.server();
    let server = ApiServer::new(state, server_config.clone());

    Ok(Application {
        router: server.into_router(),
        manager,
        notifier,
        server_config,
    })
}

/// If the cluster store is empty and a legacy `KUBECONFIG` path is present,
/// register that cluster as `default`.
async fn migrate_legacy_kubeconfig(
    config: &AppConfig,
    store: &Arc<dyn ClusterStore>,
    manager: &Arc<ClusterManager>,
) {
    if config.kubeconfig.is_empty() {
        return;
    }
    let existing = store.list().await.unwrap_or_default();
    if !existing.is_empty() {
        return;
    }

    info!(kubeconfig = %config.kubeconfig, "Migrating legacy single-cluster configuration");
    let contents = match tokio::fs::read_to_string(&config.kubeconfig).await {
        Ok(contents) => contents,
        Err(err) => {
            error!(error = %err, "Failed to read kubeconfig file for migration");
            return;
        }
    };

    let request = CreateClusterRequest {
        name: "default".to_string(),
        namespace: config.velero_namespace.clone(),
        set_as_default: true,
        kubeconfig: contents,
        ..Default::default()
    };

    match store.create(request).await {
        Ok(record) => {
            let _ = manager.add_cluster(record).await;
            info!("Legacy configuration migrated successfully");
        }
        Err(err) => error!(error = %err, "Failed to migrate legacy configuration"),
    }
}
