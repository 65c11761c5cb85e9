//! Split KV back-end: non-secret cluster metadata lives in one ConfigMap
//! document, each credential blob in its own Secret. Webhook metadata and
//! URLs are split the same way.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::{Api, DeleteParams, ListParams, PostParams, WatchEvent, WatchParams};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use vd_models::{
    ClusterRecord, ClusterStatus, ClusterSummary, CreateClusterRequest, CreateWebhookRequest,
    EventType, UpdateClusterRequest, UpdateWebhookRequest, WebhookConfig, WebhookType,
};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ClusterStore, WebhookStore};

const DEFAULT_NAMESPACE: &str = "velero";
const DEFAULT_CONFIGMAP: &str = "velero-dashboard-clusters";
const CLUSTERS_DATA_KEY: &str = "clusters.json";

const WEBHOOK_CONFIGMAP: &str = "velero-dashboard-webhooks";
const WEBHOOK_URL_SECRET: &str = "velero-dashboard-webhook-urls";
const WEBHOOK_DATA_KEY: &str = "webhooks.json";

const SECRET_LABEL_SELECTOR: &str =
    "app.kubernetes.io/name=velero-dashboard,app.kubernetes.io/component=cluster-kubeconfig";

const ANNOTATION_CLUSTER_NAME: &str = "velero-dashboard/cluster-name";
const ANNOTATION_CLUSTER_NAMESPACE: &str = "velero-dashboard/cluster-namespace";
const ANNOTATION_IS_DEFAULT: &str = "velero-dashboard/is-default";
const LABEL_CLUSTER_ID: &str = "velero-dashboard/cluster-id";

fn component_labels(component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/name".to_string(),
            "velero-dashboard".to_string(),
        ),
        (
            "app.kubernetes.io/component".to_string(),
            component.to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            "velero-dashboard".to_string(),
        ),
    ])
}

fn secret_name_for(id: &str) -> String {
    format!("velero-dashboard-cluster-{id}")
}

/// Per-record metadata as stored in the ConfigMap document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterMetadata {
    name: String,
    namespace: String,
    secret_ref: String,
    status: ClusterStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    status_message: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_health_check: Option<DateTime<Utc>>,
}

pub struct K8sClusterStore {
    client: Client,
    namespace: String,
    configmap_name: String,
}

impl K8sClusterStore {
    pub async fn new(
        client: Client,
        namespace: &str,
        configmap_name: &str,
    ) -> StoreResult<Self> {
        let store = K8sClusterStore {
            client,
            namespace: if namespace.is_empty() {
                DEFAULT_NAMESPACE.to_string()
            } else {
                namespace.to_string()
            },
            configmap_name: if configmap_name.is_empty() {
                DEFAULT_CONFIGMAP.to_string()
            } else {
                configmap_name.to_string()
            },
        };

        store.ensure_configmap().await?;
        info!(
            namespace = %store.namespace,
            configmap = %store.configmap_name,
            "Kubernetes cluster store initialized"
        );
        Ok(store)
    }

    fn configmaps(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn ensure_configmap(&self) -> StoreResult<()> {
        let api = self.configmaps();
        if api.get_opt(&self.configmap_name).await?.is_some() {
            return Ok(());
        }

        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.configmap_name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(component_labels("cluster-config")),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                CLUSTERS_DATA_KEY.to_string(),
                "{}".to_string(),
            )])),
            ..Default::default()
        };
        api.create(&PostParams::default(), &cm).await?;
        info!("Created ConfigMap for cluster storage");
        Ok(())
    }

    async fn load_metadata(&self) -> StoreResult<HashMap<String, ClusterMetadata>> {
        let cm = self.configmaps().get(&self.configmap_name).await?;
        let data = cm
            .data
            .as_ref()
            .and_then(|d| d.get(CLUSTERS_DATA_KEY))
            .cloned()
            .unwrap_or_default();
        if data.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    async fn save_metadata(
        &self,
        clusters: &HashMap<String, ClusterMetadata>,
    ) -> StoreResult<()> {
        let api = self.configmaps();
        let mut cm = api.get(&self.configmap_name).await?;
        cm.data
            .get_or_insert_with(BTreeMap::new)
            .insert(CLUSTERS_DATA_KEY.to_string(), serde_json::to_string_pretty(clusters)?);
        api.replace(&self.configmap_name, &PostParams::default(), &cm)
            .await?;
        Ok(())
    }

    async fn read_credential(&self, secret_ref: &str) -> StoreResult<Vec<u8>> {
        let secret = self.secrets().get(secret_ref).await?;
        secret
            .data
            .as_ref()
            .and_then(|d| d.get("kubeconfig"))
            .map(|b| b.0.clone())
            .filter(|b| !b.is_empty())
            .ok_or_else(|| StoreError::Backend(format!("kubeconfig not found in Secret {secret_ref}")))
    }

    /// Converges ConfigMap metadata with the label-selected Secret space.
    /// Returns true when metadata was changed and persisted.
    async fn reconcile_secrets(&self) -> bool {
        let lp = ListParams::default().labels(SECRET_LABEL_SELECTOR);
        let secrets = match self.secrets().list(&lp).await {
            Ok(list) => list,
            Err(err) => {
                error!(error = %err, "Failed to list Secrets for reconciliation");
                return false;
            }
        };

        let mut clusters = match self.load_metadata().await {
            Ok(clusters) => clusters,
            Err(err) => {
                error!(error = %err, "Failed to load metadata for reconciliation");
                return false;
            }
        };

        let mut changed = false;

        let existing_secrets: std::collections::HashSet<String> = secrets
            .items
            .iter()
            .filter_map(|s| s.metadata.name.clone())
            .collect();
        let tracked_secrets: std::collections::HashSet<String> =
            clusters.values().map(|m| m.secret_ref.clone()).collect();

        for secret in &secrets.items {
            let Some(secret_name) = secret.metadata.name.clone() else {
                continue;
            };
            if tracked_secrets.contains(&secret_name) {
                continue;
            }
            let has_kubeconfig = secret
                .data
                .as_ref()
                .is_some_and(|d| d.contains_key("kubeconfig"));
            if !has_kubeconfig {
                continue;
            }

            let annotations = secret.metadata.annotations.clone().unwrap_or_default();
            let labels = secret.metadata.labels.clone().unwrap_or_default();

            let cluster_name = annotations
                .get(ANNOTATION_CLUSTER_NAME)
                .cloned()
                .filter(|n| !n.is_empty())
                .or_else(|| labels.get(LABEL_CLUSTER_ID).cloned().filter(|n| !n.is_empty()));
            let Some(cluster_name) = cluster_name else {
                warn!(secret = %secret_name, "Secret missing cluster-name annotation, skipping");
                continue;
            };

            let cluster_namespace = annotations
                .get(ANNOTATION_CLUSTER_NAMESPACE)
                .cloned()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
            let is_default = annotations
                .get(ANNOTATION_IS_DEFAULT)
                .is_some_and(|v| v == "true");

            let id = Uuid::new_v4().to_string();
            if is_default {
                for meta in clusters.values_mut() {
                    meta.is_default = false;
                }
            }

            let created_at = secret
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|t| t.0)
                .unwrap_or_else(Utc::now);

            clusters.insert(
                id.clone(),
                ClusterMetadata {
                    name: cluster_name.clone(),
                    namespace: cluster_namespace,
                    secret_ref: secret_name.clone(),
                    status: ClusterStatus::Pending,
                    status_message: String::new(),
                    is_default,
                    created_at,
                    last_health_check: None,
                },
            );

            info!(id = %id, name = %cluster_name, secret = %secret_name, "Discovered external cluster Secret");
            changed = true;
        }

        clusters.retain(|id, meta| {
            if existing_secrets.contains(&meta.secret_ref) {
                true
            } else {
                info!(
                    id = %id,
                    name = %meta.name,
                    secret = %meta.secret_ref,
                    "Cluster Secret deleted externally, removing from metadata"
                );
                changed = true;
                false
            }
        });

        if changed {
            if let Err(err) = self.save_metadata(&clusters).await {
                error!(error = %err, "Failed to save reconciled metadata");
                return false;
            }
            info!(total = clusters.len(), "Reconciliation complete");
        }

        changed
    }
}

#[async_trait::async_trait]
impl ClusterStore for K8sClusterStore {
    async fn create(&self, req: CreateClusterRequest) -> StoreResult<ClusterRecord> {
        let id = Uuid::new_v4().to_string();
        let secret_name = secret_name_for(&id);

        let mut clusters = self.load_metadata().await?;
        if clusters.values().any(|m| m.name == req.name) {
            return Err(StoreError::DuplicateName(req.name));
        }

        if req.set_as_default {
            for meta in clusters.values_mut() {
                meta.is_default = false;
            }
        }

        let mut labels = component_labels("cluster-kubeconfig");
        labels.insert(LABEL_CLUSTER_ID.to_string(), id.clone());

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(secret_name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            string_data: Some(BTreeMap::from([(
                "kubeconfig".to_string(),
                req.kubeconfig.clone(),
            )])),
            ..Default::default()
        };
        self.secrets().create(&PostParams::default(), &secret).await?;

        let now = Utc::now();
        clusters.insert(
            id.clone(),
            ClusterMetadata {
                name: req.name.clone(),
                namespace: req.namespace.clone(),
                secret_ref: secret_name.clone(),
                status: ClusterStatus::Pending,
                status_message: String::new(),
                is_default: req.set_as_default,
                created_at: now,
                last_health_check: None,
            },
        );

        if let Err(err) = self.save_metadata(&clusters).await {
            // Secret is orphaned if the metadata commit failed; clean it up.
            let _ = self
                .secrets()
                .delete(&secret_name, &DeleteParams::default())
                .await;
            return Err(err);
        }

        Ok(ClusterRecord {
            id,
            name: req.name,
            credential_blob: req.kubeconfig.into_bytes(),
            namespace: req.namespace,
            status: ClusterStatus::Pending,
            status_message: String::new(),
            is_default: req.set_as_default,
            created_at: now,
            last_health_check: None,
        })
    }

    async fn get(&self, id: &str) -> StoreResult<ClusterRecord> {
        let clusters = self.load_metadata().await?;
        let meta = clusters
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("cluster {id}")))?;

        let credential_blob = self.read_credential(&meta.secret_ref).await?;

        Ok(ClusterRecord {
            id: id.to_string(),
            name: meta.name.clone(),
            credential_blob,
            namespace: meta.namespace.clone(),
            status: meta.status,
            status_message: meta.status_message.clone(),
            is_default: meta.is_default,
            created_at: meta.created_at,
            last_health_check: meta.last_health_check,
        })
    }

    async fn list(&self) -> StoreResult<Vec<ClusterSummary>> {
        let clusters = self.load_metadata().await?;
        let mut summaries: Vec<ClusterSummary> = clusters
            .into_iter()
            .map(|(id, meta)| ClusterSummary {
                id,
                name: meta.name,
                namespace: meta.namespace,
                status: meta.status,
                status_message: meta.status_message,
                is_default: meta.is_default,
                created_at: meta.created_at,
                last_health_check: meta.last_health_check,
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(summaries)
    }

    async fn update(&self, id: &str, req: UpdateClusterRequest) -> StoreResult<()> {
        let mut clusters = self.load_metadata().await?;
        if !clusters.contains_key(id) {
            return Err(StoreError::NotFound(format!("cluster {id}")));
        }

        if req.set_as_default == Some(true) {
            for meta in clusters.values_mut() {
                meta.is_default = false;
            }
        }

        let meta = clusters
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("cluster {id}")))?;
        if let Some(name) = req.name {
            meta.name = name;
        }
        if let Some(namespace) = req.namespace {
            meta.namespace = namespace;
        }
        if let Some(is_default) = req.set_as_default {
            meta.is_default = is_default;
        }
        let secret_ref = meta.secret_ref.clone();

        if let Some(kubeconfig) = req.kubeconfig {
            let api = self.secrets();
            let mut secret = api.get(&secret_ref).await?;
            secret.string_data = Some(BTreeMap::from([(
                "kubeconfig".to_string(),
                kubeconfig,
            )]));
            api.replace(&secret_ref, &PostParams::default(), &secret)
                .await?;
        }

        self.save_metadata(&clusters).await
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut clusters = self.load_metadata().await?;
        let meta = clusters
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(format!("cluster {id}")))?;

        if let Err(err) = self
            .secrets()
            .delete(&meta.secret_ref, &DeleteParams::default())
            .await
        {
            warn!(secret = %meta.secret_ref, error = %err, "Failed to delete Secret");
        }

        self.save_metadata(&clusters).await
    }

    async fn update_status(
        &self,
        id: &str,
        status: ClusterStatus,
        message: &str,
    ) -> StoreResult<()> {
        let mut clusters = self.load_metadata().await?;
        let meta = clusters
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("cluster {id}")))?;
        meta.status = status;
        meta.status_message = message.to_string();
        meta.last_health_check = Some(Utc::now());
        self.save_metadata(&clusters).await
    }

    async fn get_default(&self) -> StoreResult<ClusterRecord> {
        let clusters = self.load_metadata().await?;
        let id = clusters
            .iter()
            .find(|(_, meta)| meta.is_default)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| StoreError::NotFound("no default cluster configured".to_string()))?;
        self.get(&id).await
    }

    async fn watch_external_changes(
        &self,
        token: CancellationToken,
        notify: mpsc::Sender<()>,
    ) -> StoreResult<()> {
        let api = self.secrets();
        let wp = WatchParams::default().labels(SECRET_LABEL_SELECTOR);

        loop {
            if token.is_cancelled() {
                return Ok(());
            }

            let stream = match api.watch(&wp, "0").await {
                Ok(stream) => stream,
                Err(err) => {
                    error!(error = %err, "Failed to watch Secrets");
                    tokio::select! {
                        _ = token.cancelled() => return Ok(()),
                        _ = sleep(Duration::from_secs(5)) => continue,
                    }
                }
            };
            let mut stream = stream.boxed();

            // Initial reconciliation on every fresh subscription.
            if self.reconcile_secrets().await {
                let _ = notify.send(()).await;
            }

            info!(
                namespace = %self.namespace,
                label_selector = SECRET_LABEL_SELECTOR,
                "Started watching Secrets for external cluster changes"
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    item = stream.try_next() => match item {
                        Ok(Some(WatchEvent::Added(secret)))
                        | Ok(Some(WatchEvent::Modified(secret)))
                        | Ok(Some(WatchEvent::Deleted(secret))) => {
                            info!(
                                secret = secret.metadata.name.as_deref().unwrap_or("unknown"),
                                "Secret change detected"
                            );
                            if self.reconcile_secrets().await {
                                let _ = notify.send(()).await;
                            }
                        }
                        Ok(Some(WatchEvent::Bookmark(_))) => {}
                        Ok(Some(WatchEvent::Error(status))) => {
                            warn!(error = %status.message, "Secret watch returned error event, restarting");
                            break;
                        }
                        Ok(None) => {
                            warn!("Secret watch channel closed, restarting");
                            break;
                        }
                        Err(err) => {
                            warn!(error = %err, "Secret watch failed, restarting");
                            break;
                        }
                    }
                }
            }

            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = sleep(Duration::from_secs(1)) => {}
            }
        }
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Webhook metadata as stored in the ConfigMap; URLs live in the Secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookMetadata {
    id: String,
    name: String,
    #[serde(rename = "type")]
    webhook_type: WebhookType,
    events: Vec<EventType>,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_sent_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    last_status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    last_error: String,
}

impl WebhookMetadata {
    fn into_config(self, url: String) -> WebhookConfig {
        WebhookConfig {
            id: self.id,
            name: self.name,
            webhook_type: self.webhook_type,
            url,
            events: self.events,
            enabled: self.enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_sent_at: self.last_sent_at,
            last_status: self.last_status,
            last_error: self.last_error,
        }
    }
}

pub struct K8sWebhookStore {
    client: Client,
    namespace: String,
}

impl K8sWebhookStore {
    pub async fn new(client: Client, namespace: &str) -> StoreResult<Self> {
        let store = K8sWebhookStore {
            client,
            namespace: if namespace.is_empty() {
                DEFAULT_NAMESPACE.to_string()
            } else {
                namespace.to_string()
            },
        };
        store.ensure_resources().await?;
        Ok(store)
    }

    fn configmaps(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn secrets(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn ensure_resources(&self) -> StoreResult<()> {
        let labels = component_labels("webhook-config");

        let cm_api = self.configmaps();
        if cm_api.get_opt(WEBHOOK_CONFIGMAP).await?.is_none() {
            let cm = ConfigMap {
                metadata: ObjectMeta {
                    name: Some(WEBHOOK_CONFIGMAP.to_string()),
                    namespace: Some(self.namespace.clone()),
                    labels: Some(labels.clone()),
                    ..Default::default()
                },
                data: Some(BTreeMap::from([(
                    WEBHOOK_DATA_KEY.to_string(),
                    "{}".to_string(),
                )])),
                ..Default::default()
            };
            cm_api.create(&PostParams::default(), &cm).await?;
        }

        let secret_api = self.secrets();
        if secret_api.get_opt(WEBHOOK_URL_SECRET).await?.is_none() {
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(WEBHOOK_URL_SECRET.to_string()),
                    namespace: Some(self.namespace.clone()),
                    labels: Some(labels),
                    ..Default::default()
                },
                type_: Some("Opaque".to_string()),
                ..Default::default()
            };
            secret_api.create(&PostParams::default(), &secret).await?;
        }

        Ok(())
    }

    async fn load_metadata(&self) -> StoreResult<HashMap<String, WebhookMetadata>> {
        let cm = self.configmaps().get(WEBHOOK_CONFIGMAP).await?;
        let data = cm
            .data
            .as_ref()
            .and_then(|d| d.get(WEBHOOK_DATA_KEY))
            .cloned()
            .unwrap_or_default();
        if data.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    async fn save_metadata(
        &self,
        metadata: &HashMap<String, WebhookMetadata>,
    ) -> StoreResult<()> {
        let api = self.configmaps();
        let mut cm = api.get(WEBHOOK_CONFIGMAP).await?;
        cm.data
            .get_or_insert_with(BTreeMap::new)
            .insert(WEBHOOK_DATA_KEY.to_string(), serde_json::to_string(metadata)?);
        api.replace(WEBHOOK_CONFIGMAP, &PostParams::default(), &cm)
            .await?;
        Ok(())
    }

    async fn load_urls(&self) -> StoreResult<HashMap<String, String>> {
        let secret = self.secrets().get(WEBHOOK_URL_SECRET).await?;
        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, String::from_utf8_lossy(&v.0).into_owned()))
            .collect())
    }

    async fn save_url(&self, id: &str, url: &str) -> StoreResult<()> {
        let api = self.secrets();
        let mut secret = api.get(WEBHOOK_URL_SECRET).await?;
        secret
            .string_data
            .get_or_insert_with(BTreeMap::new)
            .insert(id.to_string(), url.to_string());
        api.replace(WEBHOOK_URL_SECRET, &PostParams::default(), &secret)
            .await?;
        Ok(())
    }

    async fn delete_url(&self, id: &str) -> StoreResult<()> {
        let api = self.secrets();
        let mut secret = api.get(WEBHOOK_URL_SECRET).await?;
        if let Some(data) = secret.data.as_mut() {
            data.remove(id);
        }
        api.replace(WEBHOOK_URL_SECRET, &PostParams::default(), &secret)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl WebhookStore for K8sWebhookStore {
    async fn create(&self, req: CreateWebhookRequest) -> StoreResult<WebhookConfig> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut metadata = self.load_metadata().await?;
        metadata.insert(
            id.clone(),
            WebhookMetadata {
                id: id.clone(),
                name: req.name.clone(),
                webhook_type: req.webhook_type,
                events: req.events.clone(),
                enabled: req.enabled,
                created_at: now,
                updated_at: now,
                last_sent_at: None,
                last_status: String::new(),
                last_error: String::new(),
            },
        );

        self.save_metadata(&metadata).await?;
        self.save_url(&id, &req.url).await?;

        Ok(WebhookConfig {
            id,
            name: req.name,
            webhook_type: req.webhook_type,
            url: req.url,
            events: req.events,
            enabled: req.enabled,
            created_at: now,
            updated_at: now,
            last_sent_at: None,
            last_status: String::new(),
            last_error: String::new(),
        })
    }

    async fn get(&self, id: &str) -> StoreResult<WebhookConfig> {
        let mut metadata = self.load_metadata().await?;
        let meta = metadata
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(format!("webhook {id}")))?;
        let urls = self.load_urls().await?;
        Ok(meta.into_config(urls.get(id).cloned().unwrap_or_default()))
    }

    async fn list(&self) -> StoreResult<Vec<WebhookConfig>> {
        let metadata = self.load_metadata().await?;
        let urls = self.load_urls().await?;
        Ok(metadata
            .into_iter()
            .map(|(id, meta)| {
                let url = urls.get(&id).cloned().unwrap_or_default();
                meta.into_config(url)
            })
            .collect())
    }

    async fn update(&self, id: &str, req: UpdateWebhookRequest) -> StoreResult<()> {
        let mut metadata = self.load_metadata().await?;
        let meta = metadata
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("webhook {id}")))?;

        if let Some(name) = req.name {
            meta.name = name;
        }
        if let Some(webhook_type) = req.webhook_type {
            meta.webhook_type = webhook_type;
        }
        if let Some(events) = req.events {
            meta.events = events;
        }
        if let Some(enabled) = req.enabled {
            meta.enabled = enabled;
        }
        meta.updated_at = Utc::now();

        self.save_metadata(&metadata).await?;

        if let Some(url) = req.url {
            self.save_url(id, &url).await?;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut metadata = self.load_metadata().await?;
        if metadata.remove(id).is_none() {
            return Err(StoreError::NotFound(format!("webhook {id}")));
        }
        self.save_metadata(&metadata).await?;
        self.delete_url(id).await
    }

    async fn update_delivery_status(
        &self,
        id: &str,
        status: &str,
        error_message: &str,
    ) -> StoreResult<()> {
        let mut metadata = self.load_metadata().await?;
        // Missing webhooks are ignored: the config may have been deleted
        // while a delivery was in flight.
        let Some(meta) = metadata.get_mut(id) else {
            return Ok(());
        };

        let now = Utc::now();
        meta.last_sent_at = Some(now);
        meta.last_status = status.to_string();
        meta.last_error = error_message.to_string();
        meta.updated_at = now;

        self.save_metadata(&metadata).await
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
