use std::sync::Arc;

use kube::Client;
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::kubernetes::{K8sClusterStore, K8sWebhookStore};
use crate::sqlite::{SqliteClusterStore, SqliteWebhookStore};
use crate::traits::{ClusterStore, WebhookStore};

/// Which back-end to use for cluster and webhook records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Auto,
    Sqlite,
    Kubernetes,
}

impl std::str::FromStr for StorageKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "auto" => Ok(StorageKind::Auto),
            "sqlite" => Ok(StorageKind::Sqlite),
            "kubernetes" => Ok(StorageKind::Kubernetes),
            other => Err(StoreError::Configuration(format!(
                "unknown storage type: {other}"
            ))),
        }
    }
}

/// Configuration for store construction.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub storage_type: StorageKind,
    pub db_path: String,
    pub encryption_key: Option<String>,
    pub namespace: String,
    pub configmap_name: String,
}

fn in_cluster() -> bool {
    std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}

impl StoreConfig {
    fn resolve(&self) -> StorageKind {
        match self.storage_type {
            StorageKind::Auto => {
                if in_cluster() {
                    info!("Auto-detected in-cluster environment, using Kubernetes storage");
                    StorageKind::Kubernetes
                } else {
                    info!("Auto-detected local environment, using SQLite storage");
                    StorageKind::Sqlite
                }
            }
            kind => kind,
        }
    }
}

pub async fn create_cluster_store(cfg: &StoreConfig) -> StoreResult<Arc<dyn ClusterStore>> {
    match cfg.resolve() {
        StorageKind::Kubernetes => {
            let client = Client::try_default()
                .await
                .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
            Ok(Arc::new(
                K8sClusterStore::new(client, &cfg.namespace, &cfg.configmap_name).await?,
            ))
        }
        _ => Ok(Arc::new(SqliteClusterStore::new(
            &cfg.db_path,
            cfg.encryption_key.as_deref(),
        )?)),
    }
}

pub async fn create_webhook_store(cfg: &StoreConfig) -> StoreResult<Arc<dyn WebhookStore>> {
    match cfg.resolve() {
        StorageKind::Kubernetes => {
            let client = Client::try_default()
                .await
                .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
            Ok(Arc::new(K8sWebhookStore::new(client, &cfg.namespace).await?))
        }
        _ => Ok(Arc::new(SqliteWebhookStore::new(&cfg.db_path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_kind_parses_known_values() {
        assert_eq!("auto".parse::<StorageKind>().unwrap(), StorageKind::Auto);
        assert_eq!("".parse::<StorageKind>().unwrap(), StorageKind::Auto);
        assert_eq!(
            "sqlite".parse::<StorageKind>().unwrap(),
            StorageKind::Sqlite
        );
        assert_eq!(
            "kubernetes".parse::<StorageKind>().unwrap(),
            StorageKind::Kubernetes
        );
    }

    #[test]
    fn unknown_storage_kind_is_a_configuration_error() {
        assert!(matches!(
            "redis".parse::<StorageKind>(),
            Err(StoreError::Configuration(_))
        ));
    }
}
