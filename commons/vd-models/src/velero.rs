use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn is_empty_vec(v: &Vec<String>) -> bool {
    v.is_empty()
}

/// API projection of a Velero Backup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResponse {
    pub name: String,
    pub namespace: String,
    pub phase: String,
    pub errors: i64,
    pub warnings: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub included_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub excluded_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub included_resources: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub excluded_resources: Vec<String>,
    pub storage_location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ttl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    pub items_backed_up: i64,
    pub total_items: i64,
    /// Reported only when the upstream status carries a size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_volumes: Option<bool>,
    #[serde(
        rename = "defaultVolumesToFsBackup",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_volumes_to_fs: Option<bool>,
}

/// API projection of a Velero Restore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub name: String,
    pub namespace: String,
    pub phase: String,
    pub errors: i64,
    pub warnings: i64,
    pub backup_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub included_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub excluded_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub included_resources: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub excluded_resources: Vec<String>,
    #[serde(rename = "restorePVs", skip_serializing_if = "Option::is_none")]
    pub restore_pvs: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub existing_resource_policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_mapping: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    pub items_restored: i64,
    pub total_items: i64,
}

/// API projection of a Velero Schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub name: String,
    pub namespace: String,
    pub phase: String,
    pub schedule: String,
    pub paused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub included_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub excluded_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ttl: String,
    pub storage_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// API projection of a BackupStorageLocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupStorageLocationResponse {
    pub name: String,
    pub namespace: String,
    pub phase: String,
    pub provider: String,
    pub bucket: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    pub access_mode: String,
    pub default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_validated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// API projection of a VolumeSnapshotLocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotLocationResponse {
    pub name: String,
    pub namespace: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Aggregated counters for the dashboard landing page.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_backups: i64,
    pub completed_backups: i64,
    pub failed_backups: i64,
    pub total_restores: i64,
    pub total_schedules: i64,
    pub active_schedules: i64,
    pub storage_locations: i64,
    pub healthy_locations: i64,
}

impl DashboardStats {
    /// Field-wise sum, used when aggregating across clusters.
    pub fn merge(&mut self, other: &DashboardStats) {
        self.total_backups += other.total_backups;
        self.completed_backups += other.completed_backups;
        self.failed_backups += other.failed_backups;
        self.total_restores += other.total_restores;
        self.total_schedules += other.total_schedules;
        self.active_schedules += other.active_schedules;
        self.storage_locations += other.storage_locations;
        self.healthy_locations += other.healthy_locations;
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackupRequest {
    pub name: String,
    #[serde(default)]
    pub included_namespaces: Vec<String>,
    #[serde(default)]
    pub excluded_namespaces: Vec<String>,
    #[serde(default)]
    pub included_resources: Vec<String>,
    #[serde(default)]
    pub excluded_resources: Vec<String>,
    #[serde(default)]
    pub storage_location: String,
    #[serde(default)]
    pub volume_snapshot_locations: Vec<String>,
    #[serde(default)]
    pub ttl: String,
    pub snapshot_volumes: Option<bool>,
    #[serde(rename = "defaultVolumesToFsBackup")]
    pub default_volumes_to_fs: Option<bool>,
    #[serde(default)]
    pub label_selector: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRestoreRequest {
    #[serde(default)]
    pub name: String,
    pub backup_name: String,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub included_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub excluded_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub included_resources: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub excluded_resources: Vec<String>,
    #[serde(rename = "restorePVs", skip_serializing_if = "Option::is_none")]
    pub restore_pvs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_mapping: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub existing_resource_policy: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub name: String,
    pub schedule: String,
    #[serde(default)]
    pub included_namespaces: Vec<String>,
    #[serde(default)]
    pub excluded_namespaces: Vec<String>,
    #[serde(default)]
    pub included_resources: Vec<String>,
    #[serde(default)]
    pub excluded_resources: Vec<String>,
    #[serde(default)]
    pub storage_location: String,
    #[serde(default)]
    pub volume_snapshot_locations: Vec<String>,
    #[serde(default)]
    pub ttl: String,
    pub snapshot_volumes: Option<bool>,
    #[serde(rename = "defaultVolumesToFsBackup")]
    pub default_volumes_to_fs: Option<bool>,
    #[serde(default)]
    pub paused: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackupStorageLocationRequest {
    pub name: String,
    pub provider: String,
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub s3_url: String,
    pub s3_force_path_style: Option<bool>,
    #[serde(default)]
    pub storage_account: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub access_mode: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBackupStorageLocationRequest {
    #[serde(default)]
    pub access_mode: String,
    #[serde(default)]
    pub credential: String,
    pub config: Option<HashMap<String, String>>,
    pub default: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeSnapshotLocationRequest {
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVolumeSnapshotLocationRequest {
    #[serde(default)]
    pub credential: String,
    pub config: Option<HashMap<String, String>>,
}

/// One side of a backup comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSummary {
    pub name: String,
    pub phase: String,
    pub created: String,
    pub items_backed_up: i64,
    pub total_items: i64,
    pub errors: i64,
    pub warnings: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    pub storage_location: String,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub included_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub excluded_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub included_resources: Vec<String>,
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub excluded_resources: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ttl: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDiff {
    pub items_diff: i64,
    pub errors_diff: i64,
    pub warnings_diff: i64,
    pub size_diff: i64,
    pub added_namespaces: Vec<String>,
    pub removed_namespaces: Vec<String>,
    pub added_resources: Vec<String>,
    pub removed_resources: Vec<String>,
    pub same_configuration: bool,
    pub storage_location_diff: bool,
    pub ttl_diff: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupComparisonResponse {
    pub backup1: BackupSummary,
    pub backup2: BackupSummary,
    pub diff: BackupDiff,
}

/// A backup visible across clusters through a shared storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossClusterBackup {
    #[serde(flatten)]
    pub backup: BackupResponse,
    pub source_cluster_id: String,
    pub source_cluster_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossClusterRestoreRequest {
    pub source_cluster_id: String,
    pub target_cluster_id: String,
    #[serde(flatten)]
    pub restore: CreateRestoreRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_response_wire_casing() {
        let backup = BackupResponse {
            name: "nightly".into(),
            namespace: "velero".into(),
            phase: "Completed".into(),
            storage_location: "default".into(),
            items_backed_up: 10,
            total_items: 10,
            default_volumes_to_fs: Some(true),
            ..Default::default()
        };

        let json = serde_json::to_value(&backup).unwrap();
        assert_eq!(json["storageLocation"], "default");
        assert_eq!(json["itemsBackedUp"], 10);
        assert_eq!(json["defaultVolumesToFsBackup"], true);
        // optional fields are omitted, not null
        assert!(json.get("created").is_none());
        assert!(json.get("sizeBytes").is_none());
        assert!(json.get("includedNamespaces").is_none());
        assert!(json.get("ttl").is_none());
    }

    #[test]
    fn cross_cluster_backup_flattens() {
        let shared = CrossClusterBackup {
            backup: BackupResponse {
                name: "snap1".into(),
                phase: "Completed".into(),
                ..Default::default()
            },
            source_cluster_id: "a".into(),
            source_cluster_name: "alpha".into(),
        };

        let json = serde_json::to_value(&shared).unwrap();
        assert_eq!(json["name"], "snap1");
        assert_eq!(json["sourceClusterId"], "a");
        assert_eq!(json["sourceClusterName"], "alpha");
    }

    #[test]
    fn cross_cluster_restore_request_flattens() {
        let req: CrossClusterRestoreRequest = serde_json::from_str(
            r#"{"sourceClusterId":"a","targetClusterId":"b","backupName":"snap1","restorePVs":true}"#,
        )
        .unwrap();
        assert_eq!(req.source_cluster_id, "a");
        assert_eq!(req.restore.backup_name, "snap1");
        assert_eq!(req.restore.restore_pvs, Some(true));
    }

    #[test]
    fn dashboard_stats_merge_sums_fields() {
        let mut a = DashboardStats {
            total_backups: 2,
            completed_backups: 1,
            failed_backups: 1,
            total_restores: 3,
            total_schedules: 1,
            active_schedules: 1,
            storage_locations: 1,
            healthy_locations: 1,
        };
        let b = DashboardStats {
            total_backups: 5,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.total_backups, 7);
        assert_eq!(a.total_restores, 3);
    }
}
