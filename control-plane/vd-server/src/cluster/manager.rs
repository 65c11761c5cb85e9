//! The cluster registry: one live connection, four watchers and a health
//! probe per registered cluster. The map lock is only ever held around
//! membership changes, never across I/O.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use vd_models::{ClusterRecord, ClusterStatus, ClusterSummary};
use vd_store::ClusterStore;

use crate::cluster::client::VeleroClient;
use crate::cluster::watcher::{WatchContext, spawn_watchers};
use crate::errors::ClusterError;
use crate::hub::Hub;
use crate::metrics;
use crate::notify::EventNotifier;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const HEALTH_INTERVAL: Duration = Duration::from_secs(30);
const STARTUP_STAGGER: Duration = Duration::from_millis(100);

struct ManagedCluster {
    name: String,
    client: VeleroClient,
    cancel: CancellationToken,
}

pub struct ClusterManager {
    store: Arc<dyn ClusterStore>,
    hub: Arc<Hub>,
    notifier: Option<Arc<dyn EventNotifier>>,
    clusters: RwLock<HashMap<String, ManagedCluster>>,
    root: CancellationToken,
    tracker: TaskTracker,
}

impl ClusterManager {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        hub: Arc<Hub>,
        notifier: Option<Arc<dyn EventNotifier>>,
    ) -> Arc<Self> {
        Arc::new(ClusterManager {
            store,
            hub,
            notifier,
            clusters: RwLock::new(HashMap::new()),
            root: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }

    pub fn store(&self) -> &Arc<dyn ClusterStore> {
        &self.store
    }

    /// Connects every stored cluster (staggered to avoid a connection storm)
    /// and starts the periodic health probe.
    pub async fn start(self: Arc<Self>) -> Result<(), ClusterError> {
        let summaries = self.store.list().await?;
        info!(count = summaries.len(), "Loading clusters from store");
        metrics::CLUSTERS_TOTAL.set(summaries.len() as f64);

        for (i, summary) in summaries.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(STARTUP_STAGGER).await;
            }

            let record = match self.store.get(&summary.id).await {
                Ok(record) => record,
                Err(err) => {
                    error!(id = %summary.id, name = %summary.name, error = %err, "Failed to load cluster details");
                    continue;
                }
            };

            if let Err(err) = self.add_cluster(record).await {
                error!(name = %summary.name, error = %err, "Failed to connect to cluster");
            }
        }

        let manager = Arc::clone(&self);
        self.tracker.spawn(async move {
            let mut ticker = tokio::time::interval(HEALTH_INTERVAL);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = manager.root.cancelled() => break,
                    _ = ticker.tick() => Arc::clone(&manager).run_health_checks().await,
                }
            }
        });

        info!(
            connected = self.clusters.read().await.len(),
            total = summaries.len(),
            "Cluster manager started"
        );
        Ok(())
    }

    /// Builds a client, probes the cluster, then starts its watchers. The
    /// record keeps its store entry even when the probe fails; only the
    /// in-memory connection is withheld.
    pub async fn add_cluster(&self, record: ClusterRecord) -> Result<(), ClusterError> {
        if self.clusters.read().await.contains_key(&record.id) {
            return Err(ClusterError::AlreadyConnected);
        }

        // Client construction and the connection probe happen outside the
        // lock; both can block for seconds.
        let client =
            match VeleroClient::from_kubeconfig_bytes(&record.credential_blob, &record.namespace)
                .await
            {
                Ok(client) => client,
                Err(err) => {
                    let _ = self
                        .store
                        .update_status(&record.id, ClusterStatus::Error, &err.to_string())
                        .await;
                    return Err(err);
                }
            };

        if let Err(err) = client.test_connection(CONNECT_TIMEOUT).await {
            let _ = self
                .store
                .update_status(&record.id, ClusterStatus::Error, &err.to_string())
                .await;
            return Err(err);
        }

        {
            let mut clusters = self.clusters.write().await;
            if clusters.contains_key(&record.id) {
                return Err(ClusterError::AlreadyConnected);
            }

            let cancel = self.root.child_token();
            let ctx = Arc::new(WatchContext {
                cluster_id: record.id.clone(),
                cluster_name: record.name.clone(),
                hub: Arc::clone(&self.hub),
                notifier: self.notifier.clone(),
            });
            spawn_watchers(&client, ctx, cancel.clone(), &self.tracker);

            clusters.insert(
                record.id.clone(),
                ManagedCluster {
                    name: record.name.clone(),
                    client,
                    cancel,
                },
            );
            metrics::CLUSTERS_CONNECTED.set(clusters.len() as f64);
        }

        let _ = self
            .store
            .update_status(&record.id, ClusterStatus::Connected, "")
            .await;
        info!(id = %record.id, name = %record.name, namespace = %record.namespace, "Cluster connected");
        Ok(())
    }

    /// Cancels the watchers and drops the in-memory entry. The store record
    /// is the caller's responsibility.
    pub async fn remove_cluster(&self, id: &str) -> Result<(), ClusterError> {
        let mut clusters = self.clusters.write().await;
        let managed = clusters
            .remove(id)
            .ok_or_else(|| ClusterError::NotConnected(id.to_string()))?;
        managed.cancel.cancel();
        metrics::CLUSTERS_CONNECTED.set(clusters.len() as f64);
        info!(id, name = %managed.name, "Cluster removed");
        Ok(())
    }

    pub async fn get_client(&self, id: &str) -> Result<VeleroClient, ClusterError> {
        self.clusters
            .read()
            .await
            .get(id)
            .map(|managed| managed.client.clone())
            .ok_or_else(|| ClusterError::NotConnected(id.to_string()))
    }

    pub async fn get_default_client(&self) -> Result<VeleroClient, ClusterError> {
        let record = self
            .store
            .get_default()
            .await
            .map_err(|_| ClusterError::NoDefaultCluster)?;
        self.get_client(&record.id).await
    }

    pub async fn all_clients(&self) -> HashMap<String, VeleroClient> {
        self.clusters
            .read()
            .await
            .iter()
            .map(|(id, managed)| (id.clone(), managed.client.clone()))
            .collect()
    }

    pub async fn list_clusters(&self) -> Result<Vec<ClusterSummary>, ClusterError> {
        Ok(self.store.list().await?)
    }

    pub async fn connected_count(&self) -> usize {
        self.clusters.read().await.len()
    }

    async fn run_health_checks(self: Arc<Self>) {
        let ids: Vec<String> = self.clusters.read().await.keys().cloned().collect();
        for id in ids {
            let manager = Arc::clone(&self);
            self.tracker.spawn(async move {
                manager.health_check_cluster(&id).await;
            });
        }
    }

    async fn health_check_cluster(&self, id: &str) {
        let Some((name, client)) = self
            .clusters
            .read()
            .await
            .get(id)
            .map(|managed| (managed.name.clone(), managed.client.clone()))
        else {
            return;
        };

        match client.test_connection(HEALTH_PROBE_TIMEOUT).await {
            Ok(()) => {
                let _ = self
                    .store
                    .update_status(id, ClusterStatus::Connected, "")
                    .await;
            }
            Err(err) => {
                warn!(cluster = id, name = %name, error = %err, "Health check failed");
                metrics::HEALTH_CHECK_FAILURES.with_label_values(&[id]).inc();
                let _ = self
                    .store
                    .update_status(id, ClusterStatus::Error, &err.to_string())
                    .await;
            }
        }
    }

    /// Watches the store's external credential space (kubernetes back-end
    /// only) and converges the live set on every signalled change.
    pub fn start_reconciliation(self: Arc<Self>) {
        let (tx, mut rx) = mpsc::channel(1);

        let store = Arc::clone(&self.store);
        let watch_token = self.root.child_token();
        self.tracker.spawn(async move {
            if let Err(err) = store.watch_external_changes(watch_token, tx).await {
                warn!(error = %err, "Cluster reconciliation watch failed");
            }
        });

        let tracker = self.tracker.clone();
        tracker.spawn(async move {
            loop {
                tokio::select! {
                    _ = self.root.cancelled() => break,
                    changed = rx.recv() => match changed {
                        Some(()) => self.reconcile().await,
                        None => break,
                    }
                }
            }
        });
    }

    /// Syncs in-memory connections with the store: connects clusters that
    /// appeared, drops clusters that are gone.
    pub async fn reconcile(&self) {
        let summaries = match self.store.list().await {
            Ok(summaries) => summaries,
            Err(err) => {
                error!(error = %err, "Reconciliation failed: could not list clusters");
                return;
            }
        };
        metrics::CLUSTERS_TOTAL.set(summaries.len() as f64);

        let store_ids: HashSet<String> = summaries.iter().map(|s| s.id.clone()).collect();
        let memory_ids: HashSet<String> =
            self.clusters.read().await.keys().cloned().collect();

        for summary in &summaries {
            if memory_ids.contains(&summary.id) {
                continue;
            }

            let record = match self.store.get(&summary.id).await {
                Ok(record) => record,
                Err(err) => {
                    error!(id = %summary.id, error = %err, "Reconciliation: failed to get cluster");
                    continue;
                }
            };

            info!(id = %record.id, name = %record.name, "Reconciliation: adding new cluster");
            if let Err(err) = self.add_cluster(record).await {
                error!(id = %summary.id, name = %summary.name, error = %err, "Reconciliation: failed to connect cluster");
            }
        }

        for id in memory_ids.difference(&store_ids) {
            info!(id = %id, "Reconciliation: removing cluster");
            if let Err(err) = self.remove_cluster(id).await {
                error!(id = %id, error = %err, "Reconciliation: failed to remove cluster");
            }
        }
    }

    /// Cancels every watcher and probe, waits for them to return, then
    /// closes the store.
    pub async fn shutdown(&self) {
        info!(
            clusters = self.clusters.read().await.len(),
            "Shutting down cluster manager"
        );

        self.root.cancel();
        self.tracker.close();
        self.tracker.wait().await;

        {
            let mut clusters = self.clusters.write().await;
            for (id, managed) in clusters.iter() {
                managed.cancel.cancel();
                info!(id = %id, name = %managed.name, "Stopped cluster");
            }
            clusters.clear();
            metrics::CLUSTERS_CONNECTED.set(0.0);
        }

        if let Err(err) = self.store.close().await {
            error!(error = %err, "Failed to close store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vd_models::CreateClusterRequest;
    use vd_store::sqlite::SqliteClusterStore;

    fn sqlite_store() -> (tempfile::TempDir, Arc<dyn ClusterStore>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clusters.db");
        let store = SqliteClusterStore::new(path.to_str().unwrap(), Some("test-key")).unwrap();
        (dir, Arc::new(store))
    }

    #[tokio::test]
    async fn add_cluster_with_bad_kubeconfig_persists_error_status() {
        let (_dir, store) = sqlite_store();
        let manager = ClusterManager::new(Arc::clone(&store), Hub::new(), None);

        let record = store
            .create(CreateClusterRequest {
                name: "broken".into(),
                namespace: "velero".into(),
                kubeconfig: "not: [valid kubeconfig".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let err = manager.add_cluster(record.clone()).await.unwrap_err();
        assert!(matches!(err, ClusterError::ClientBuild(_)));

        let stored = store.get(&record.id).await.unwrap();
        assert_eq!(stored.status, ClusterStatus::Error);
        assert!(!stored.status_message.is_empty());
        assert_eq!(manager.connected_count().await, 0);
    }

    #[tokio::test]
    async fn lookups_fail_when_not_connected() {
        let (_dir, store) = sqlite_store();
        let manager = ClusterManager::new(store, Hub::new(), None);

        assert!(matches!(
            manager.get_client("missing").await.unwrap_err(),
            ClusterError::NotConnected(_)
        ));
        assert!(matches!(
            manager.get_default_client().await.unwrap_err(),
            ClusterError::NoDefaultCluster
        ));
        assert!(matches!(
            manager.remove_cluster("missing").await.unwrap_err(),
            ClusterError::NotConnected(_)
        ));
    }

    #[tokio::test]
    async fn shutdown_waits_for_tracked_tasks() {
        let (_dir, store) = sqlite_store();
        let manager = ClusterManager::new(store, Hub::new(), None);
        Arc::clone(&manager).start().await.unwrap();
        Arc::clone(&manager).start_reconciliation();

        // must return promptly with all tasks observed as finished
        tokio::time::timeout(Duration::from_secs(5), manager.shutdown())
            .await
            .expect("shutdown did not complete");
    }
}
