//! Cross-cluster read fan-out: aggregated dashboard stats, merged resource
//! listings and shared-backup discovery. Unreachable clusters are dropped
//! from aggregate results rather than failing the whole request.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tracing::warn;

use vd_models::{
    BackupResponse, BackupStorageLocationResponse, CrossClusterBackup, DashboardStats,
    RestoreResponse, ScheduleResponse, VolumeSnapshotLocationResponse,
};

use crate::cluster::ClusterManager;

/// Identity of a storage location across clusters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BslKey {
    pub provider: String,
    pub bucket: String,
    pub prefix: String,
}

impl From<&BackupStorageLocationResponse> for BslKey {
    fn from(bsl: &BackupStorageLocationResponse) -> Self {
        BslKey {
            provider: bsl.provider.clone(),
            bucket: bsl.bucket.clone(),
            prefix: bsl.prefix.clone(),
        }
    }
}

/// Groups per-cluster storage locations by `(provider, bucket, prefix)` and
/// keeps the groups present on two or more clusters.
pub fn group_shared_bsls(
    per_cluster: &[(String, Vec<BackupStorageLocationResponse>)],
) -> HashSet<BslKey> {
    let mut groups: HashMap<BslKey, HashSet<&str>> = HashMap::new();
    for (cluster_id, bsls) in per_cluster {
        for bsl in bsls {
            groups
                .entry(BslKey::from(bsl))
                .or_default()
                .insert(cluster_id.as_str());
        }
    }
    groups
        .into_iter()
        .filter(|(_, clusters)| clusters.len() >= 2)
        .map(|(key, _)| key)
        .collect()
}

/// Picks the Completed backups stored in a shared location, tagged with
/// their source cluster. A backup is reported once, for the cluster it was
/// observed on.
pub fn collect_shared_backups(
    backups: &[(String, Vec<BackupResponse>)],
    bsls: &[(String, Vec<BackupStorageLocationResponse>)],
    shared: &HashSet<BslKey>,
    cluster_names: &HashMap<String, String>,
) -> Vec<CrossClusterBackup> {
    // clusterId -> bslName -> key
    let mut location_keys: HashMap<&str, HashMap<&str, BslKey>> = HashMap::new();
    for (cluster_id, cluster_bsls) in bsls {
        let entry = location_keys.entry(cluster_id.as_str()).or_default();
        for bsl in cluster_bsls {
            entry.insert(bsl.name.as_str(), BslKey::from(bsl));
        }
    }

    let mut results = Vec::new();
    for (cluster_id, cluster_backups) in backups {
        let Some(keys) = location_keys.get(cluster_id.as_str()) else {
            continue;
        };
        for backup in cluster_backups {
            if backup.phase != "Completed" {
                continue;
            }
            let is_shared = keys
                .get(backup.storage_location.as_str())
                .is_some_and(|key| shared.contains(key));
            if is_shared {
                results.push(CrossClusterBackup {
                    backup: backup.clone(),
                    source_cluster_id: cluster_id.clone(),
                    source_cluster_name: cluster_names
                        .get(cluster_id)
                        .cloned()
                        .unwrap_or_default(),
                });
            }
        }
    }
    results
}

/// Whether any target-side location points at the same object store as the
/// source backup's location.
pub fn has_matching_bsl(
    source: &BackupStorageLocationResponse,
    targets: &[BackupStorageLocationResponse],
) -> bool {
    targets.iter().any(|bsl| {
        bsl.provider == source.provider
            && bsl.bucket == source.bucket
            && bsl.prefix == source.prefix
    })
}

pub struct Aggregator {
    manager: Arc<ClusterManager>,
}

impl Aggregator {
    pub fn new(manager: Arc<ClusterManager>) -> Self {
        Aggregator { manager }
    }

    async fn cluster_names(&self) -> HashMap<String, String> {
        match self.manager.list_clusters().await {
            Ok(summaries) => summaries.into_iter().map(|s| (s.id, s.name)).collect(),
            Err(_) => HashMap::new(),
        }
    }

    /// Sums dashboard stats over every connected cluster; failing clusters
    /// are dropped silently.
    pub async fn stats(&self) -> DashboardStats {
        let clients = self.manager.all_clients().await;
        let fetches = clients.into_iter().map(|(id, client)| async move {
            (id, client.dashboard_stats().await)
        });

        let mut total = DashboardStats::default();
        for (id, result) in join_all(fetches).await {
            match result {
                Ok(stats) => total.merge(&stats),
                Err(err) => {
                    warn!(cluster = %id, error = %err, "Failed to fetch stats from cluster")
                }
            }
        }
        total
    }

    pub async fn all_backups(&self) -> Vec<BackupResponse> {
        let clients = self.manager.all_clients().await;
        let fetches = clients
            .into_iter()
            .map(|(id, client)| async move { (id, client.list_backups().await) });

        let mut merged = Vec::new();
        for (id, result) in join_all(fetches).await {
            match result {
                Ok(items) => merged.extend(items),
                Err(err) => {
                    warn!(cluster = %id, error = %err, "Failed to fetch backups from cluster")
                }
            }
        }
        merged
    }

    pub async fn all_restores(&self) -> Vec<RestoreResponse> {
        let clients = self.manager.all_clients().await;
        let fetches = clients
            .into_iter()
            .map(|(id, client)| async move { (id, client.list_restores().await) });

        let mut merged = Vec::new();
        for (id, result) in join_all(fetches).await {
            match result {
                Ok(items) => merged.extend(items),
                Err(err) => {
                    warn!(cluster = %id, error = %err, "Failed to fetch restores from cluster")
                }
            }
        }
        merged
    }

    pub async fn all_schedules(&self) -> Vec<ScheduleResponse> {
        let clients = self.manager.all_clients().await;
        let fetches = clients
            .into_iter()
            .map(|(id, client)| async move { (id, client.list_schedules().await) });

        let mut merged = Vec::new();
        for (id, result) in join_all(fetches).await {
            match result {
                Ok(items) => merged.extend(items),
                Err(err) => {
                    warn!(cluster = %id, error = %err, "Failed to fetch schedules from cluster")
                }
            }
        }
        merged
    }

    pub async fn all_backup_storage_locations(&self) -> Vec<BackupStorageLocationResponse> {
        self.backup_storage_locations_by_cluster()
            .await
            .into_iter()
            .flat_map(|(_, bsls)| bsls)
            .collect()
    }

    pub async fn all_volume_snapshot_locations(&self) -> Vec<VolumeSnapshotLocationResponse> {
        let clients = self.manager.all_clients().await;
        let fetches = clients.into_iter().map(|(id, client)| async move {
            (id, client.list_volume_snapshot_locations().await)
        });

        let mut merged = Vec::new();
        for (id, result) in join_all(fetches).await {
            match result {
                Ok(items) => merged.extend(items),
                Err(err) => {
                    warn!(cluster = %id, error = %err, "Failed to fetch snapshot locations from cluster")
                }
            }
        }
        merged
    }

    async fn backup_storage_locations_by_cluster(
        &self,
    ) -> Vec<(String, Vec<BackupStorageLocationResponse>)> {
        let clients = self.manager.all_clients().await;
        let fetches = clients.into_iter().map(|(id, client)| async move {
            (id, client.list_backup_storage_locations().await)
        });

        let mut per_cluster = Vec::new();
        for (id, result) in join_all(fetches).await {
            match result {
                Ok(bsls) => per_cluster.push((id, bsls)),
                Err(err) => {
                    warn!(cluster = %id, error = %err, "Failed to fetch BSLs from cluster")
                }
            }
        }
        per_cluster
    }

    async fn backups_by_cluster(&self) -> Vec<(String, Vec<BackupResponse>)> {
        let clients = self.manager.all_clients().await;
        let fetches = clients
            .into_iter()
            .map(|(id, client)| async move { (id, client.list_backups().await) });

        let mut per_cluster = Vec::new();
        for (id, result) in join_all(fetches).await {
            match result {
                Ok(backups) => per_cluster.push((id, backups)),
                Err(err) => {
                    warn!(cluster = %id, error = %err, "Failed to fetch backups from cluster")
                }
            }
        }
        per_cluster
    }

    /// Backups visible across clusters through shared storage locations:
    /// group locations by identity, then report Completed backups whose
    /// location is part of a group spanning two or more clusters.
    pub async fn shared_backups(&self) -> Vec<CrossClusterBackup> {
        if self.manager.connected_count().await < 2 {
            return Vec::new();
        }

        let cluster_names = self.cluster_names().await;

        let first_pass = self.backup_storage_locations_by_cluster().await;
        let shared = group_shared_bsls(&first_pass);
        if shared.is_empty() {
            return Vec::new();
        }

        // Second pass: backups and locations together, to map each backup's
        // storageLocation name back to a location identity.
        let (backups, bsls) = tokio::join!(
            self.backups_by_cluster(),
            self.backup_storage_locations_by_cluster()
        );

        collect_shared_backups(&backups, &bsls, &shared, &cluster_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bsl(name: &str, provider: &str, bucket: &str, prefix: &str) -> BackupStorageLocationResponse {
        BackupStorageLocationResponse {
            name: name.to_string(),
            provider: provider.to_string(),
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            ..Default::default()
        }
    }

    fn backup(name: &str, phase: &str, location: &str) -> BackupResponse {
        BackupResponse {
            name: name.to_string(),
            phase: phase.to_string(),
            storage_location: location.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn groups_only_locations_on_two_or_more_clusters() {
        let per_cluster = vec![
            (
                "a".to_string(),
                vec![bsl("shared", "aws", "x", "y/"), bsl("only-a", "aws", "x", "private/")],
            ),
            ("b".to_string(), vec![bsl("shared-b", "aws", "x", "y/")]),
        ];

        let shared = group_shared_bsls(&per_cluster);
        assert_eq!(shared.len(), 1);
        assert!(shared.contains(&BslKey {
            provider: "aws".into(),
            bucket: "x".into(),
            prefix: "y/".into(),
        }));
    }

    #[test]
    fn shared_backup_is_reported_once_for_its_source_cluster() {
        // Scenario: A and B share (aws, x, y/); snap1 lives on A.
        let bsls = vec![
            ("a".to_string(), vec![bsl("primary", "aws", "x", "y/")]),
            ("b".to_string(), vec![bsl("replica", "aws", "x", "y/")]),
        ];
        let shared = group_shared_bsls(&bsls);

        let backups = vec![
            (
                "a".to_string(),
                vec![
                    backup("snap1", "Completed", "primary"),
                    backup("in-flight", "InProgress", "primary"),
                ],
            ),
            ("b".to_string(), vec![]),
        ];
        let names = HashMap::from([
            ("a".to_string(), "alpha".to_string()),
            ("b".to_string(), "beta".to_string()),
        ]);

        let results = collect_shared_backups(&backups, &bsls, &shared, &names);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].backup.name, "snap1");
        assert_eq!(results[0].source_cluster_id, "a");
        assert_eq!(results[0].source_cluster_name, "alpha");
    }

    #[test]
    fn non_shared_location_backups_are_excluded() {
        let bsls = vec![
            (
                "a".to_string(),
                vec![bsl("shared", "aws", "x", "y/"), bsl("local", "gcp", "z", "")],
            ),
            ("b".to_string(), vec![bsl("shared", "aws", "x", "y/")]),
        ];
        let shared = group_shared_bsls(&bsls);

        let backups = vec![(
            "a".to_string(),
            vec![backup("on-local", "Completed", "local")],
        )];
        let results = collect_shared_backups(&backups, &bsls, &shared, &HashMap::new());
        assert!(results.is_empty());
    }

    #[test]
    fn matching_bsl_compares_provider_bucket_prefix() {
        let source = bsl("src", "aws", "x", "y/");
        assert!(has_matching_bsl(
            &source,
            &[bsl("other-name", "aws", "x", "y/")]
        ));
        assert!(!has_matching_bsl(&source, &[bsl("t", "aws", "x", "z/")]));
        assert!(!has_matching_bsl(&source, &[]));
    }
}
