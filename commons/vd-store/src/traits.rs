use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vd_models::{
    ClusterRecord, ClusterStatus, ClusterSummary, CreateClusterRequest, CreateWebhookRequest,
    UpdateClusterRequest, UpdateWebhookRequest, WebhookConfig,
};

use crate::error::StoreResult;

/// Durable CRUD over registered cluster records.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn create(&self, req: CreateClusterRequest) -> StoreResult<ClusterRecord>;
    async fn get(&self, id: &str) -> StoreResult<ClusterRecord>;
    async fn list(&self) -> StoreResult<Vec<ClusterSummary>>;
    async fn update(&self, id: &str, req: UpdateClusterRequest) -> StoreResult<()>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
    async fn update_status(
        &self,
        id: &str,
        status: ClusterStatus,
        message: &str,
    ) -> StoreResult<()>;
    async fn get_default(&self) -> StoreResult<ClusterRecord>;

    /// Watches the back-end for externally created or deleted cluster
    /// credentials and signals `notify` after every applied change. The
    /// default implementation returns immediately: only the kubernetes
    /// back-end has an external credential space to observe.
    async fn watch_external_changes(
        &self,
        _token: CancellationToken,
        _notify: mpsc::Sender<()>,
    ) -> StoreResult<()> {
        Ok(())
    }

    async fn close(&self) -> StoreResult<()>;
}

/// Durable CRUD over webhook configurations.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn create(&self, req: CreateWebhookRequest) -> StoreResult<WebhookConfig>;
    async fn get(&self, id: &str) -> StoreResult<WebhookConfig>;
    async fn list(&self) -> StoreResult<Vec<WebhookConfig>>;
    async fn update(&self, id: &str, req: UpdateWebhookRequest) -> StoreResult<()>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
    async fn update_delivery_status(
        &self,
        id: &str,
        status: &str,
        error_message: &str,
    ) -> StoreResult<()>;
    async fn close(&self) -> StoreResult<()>;
}
