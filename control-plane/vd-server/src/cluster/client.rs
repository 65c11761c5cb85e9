//! Authenticated client for one target cluster's Velero resources. All
//! resources are accessed dynamically; the projection into DTOs owns the
//! wire field names.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, ListParams, Patch,
    PatchParams, PostParams,
};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::{Value, json};
use tracing::info;

use vd_models::{
    BackupComparisonResponse, BackupDiff, BackupResponse, BackupStorageLocationResponse,
    BackupSummary, CreateBackupRequest, CreateBackupStorageLocationRequest, CreateRestoreRequest,
    CreateScheduleRequest, CreateVolumeSnapshotLocationRequest, DashboardStats, ResourceKind,
    RestoreResponse, ScheduleResponse, UpdateBackupStorageLocationRequest,
    UpdateVolumeSnapshotLocationRequest, VolumeSnapshotLocationResponse,
};

use crate::errors::ClusterError;

#[derive(Debug, Clone, Copy)]
enum VeleroKind {
    Backup,
    Restore,
    Schedule,
    BackupStorageLocation,
    VolumeSnapshotLocation,
    DeleteBackupRequest,
    DownloadRequest,
}

impl VeleroKind {
    fn kind(&self) -> &'static str {
        match self {
            VeleroKind::Backup => "Backup",
            VeleroKind::Restore => "Restore",
            VeleroKind::Schedule => "Schedule",
            VeleroKind::BackupStorageLocation => "BackupStorageLocation",
            VeleroKind::VolumeSnapshotLocation => "VolumeSnapshotLocation",
            VeleroKind::DeleteBackupRequest => "DeleteBackupRequest",
            VeleroKind::DownloadRequest => "DownloadRequest",
        }
    }

    fn plural(&self) -> &'static str {
        match self {
            VeleroKind::Backup => "backups",
            VeleroKind::Restore => "restores",
            VeleroKind::Schedule => "schedules",
            VeleroKind::BackupStorageLocation => "backupstoragelocations",
            VeleroKind::VolumeSnapshotLocation => "volumesnapshotlocations",
            VeleroKind::DeleteBackupRequest => "deletebackuprequests",
            VeleroKind::DownloadRequest => "downloadrequests",
        }
    }

    fn resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk("velero.io", "v1", self.kind());
        ApiResource::from_gvk_with_plural(&gvk, self.plural())
    }
}

/// Client for one target cluster, scoped to its configured velero namespace.
#[derive(Clone)]
pub struct VeleroClient {
    client: Client,
    namespace: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for VeleroClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VeleroClient")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl VeleroClient {
    /// Builds a client from raw kubeconfig bytes.
    pub async fn from_kubeconfig_bytes(blob: &[u8], namespace: &str) -> Result<Self, ClusterError> {
        let text = std::str::from_utf8(blob)
            .map_err(|e| ClusterError::ClientBuild(format!("kubeconfig is not UTF-8: {e}")))?;
        let kubeconfig = Kubeconfig::from_yaml(text)
            .map_err(|e| ClusterError::ClientBuild(format!("failed to parse kubeconfig: {e}")))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| ClusterError::ClientBuild(format!("invalid kubeconfig: {e}")))?;
        let client = Client::try_from(config)
            .map_err(|e| ClusterError::ClientBuild(format!("failed to create client: {e}")))?;

        Ok(VeleroClient {
            client,
            namespace: namespace.to_string(),
            http: reqwest::Client::new(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn api(&self, kind: VeleroKind) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, &kind.resource())
    }

    /// Returns the dynamic API used by the resource watcher for one of the
    /// four tracked kinds.
    pub fn watch_api(&self, kind: ResourceKind) -> Api<DynamicObject> {
        match kind {
            ResourceKind::Backup => self.api(VeleroKind::Backup),
            ResourceKind::Restore => self.api(VeleroKind::Restore),
            ResourceKind::Schedule => self.api(VeleroKind::Schedule),
            ResourceKind::Bsl => self.api(VeleroKind::BackupStorageLocation),
        }
    }

    /// Bounded connectivity probe: lists at most one backup.
    pub async fn test_connection(&self, timeout: Duration) -> Result<(), ClusterError> {
        let params = ListParams::default().limit(1);
        let api = self.api(VeleroKind::Backup);
        let list = api.list(&params);
        match tokio::time::timeout(timeout, list).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(ClusterError::ConnectionFailed(err.to_string())),
            Err(_) => Err(ClusterError::ConnectionFailed(format!(
                "timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }

    // --- Backups ---

    pub async fn list_backups(&self) -> Result<Vec<BackupResponse>, ClusterError> {
        let list = self.api(VeleroKind::Backup).list(&ListParams::default()).await?;
        Ok(list.items.iter().map(parse_backup).collect())
    }

    pub async fn get_backup(&self, name: &str) -> Result<BackupResponse, ClusterError> {
        let obj = self.api(VeleroKind::Backup).get(name).await?;
        Ok(parse_backup(&obj))
    }

    pub async fn create_backup(
        &self,
        req: CreateBackupRequest,
    ) -> Result<BackupResponse, ClusterError> {
        let mut spec = serde_json::Map::new();
        insert_string_list(&mut spec, "includedNamespaces", &req.included_namespaces);
        insert_string_list(&mut spec, "excludedNamespaces", &req.excluded_namespaces);
        insert_string_list(&mut spec, "includedResources", &req.included_resources);
        insert_string_list(&mut spec, "excludedResources", &req.excluded_resources);
        if !req.storage_location.is_empty() {
            spec.insert("storageLocation".into(), json!(req.storage_location));
        }
        insert_string_list(
            &mut spec,
            "volumeSnapshotLocations",
            &req.volume_snapshot_locations,
        );
        if !req.ttl.is_empty() {
            spec.insert("ttl".into(), json!(req.ttl));
        }
        if let Some(snapshot_volumes) = req.snapshot_volumes {
            spec.insert("snapshotVolumes".into(), json!(snapshot_volumes));
        }
        if let Some(fs_backup) = req.default_volumes_to_fs {
            spec.insert("defaultVolumesToFsBackup".into(), json!(fs_backup));
        }
        if !req.label_selector.is_empty() {
            spec.insert("labelSelector".into(), json!({ "matchLabels": {} }));
        }

        let obj = self.new_object(VeleroKind::Backup, &req.name, Value::Object(spec));
        let created = self
            .api(VeleroKind::Backup)
            .create(&PostParams::default(), &obj)
            .await?;

        info!(name = %req.name, "Backup created");
        Ok(parse_backup(&created))
    }

    /// Backup deletion goes through a DeleteBackupRequest so the server also
    /// removes the object-store artifacts.
    pub async fn delete_backup(&self, name: &str) -> Result<(), ClusterError> {
        let request_name = format!("delete-{}-{}", name, Utc::now().timestamp());
        let obj = self.new_object(
            VeleroKind::DeleteBackupRequest,
            &request_name,
            json!({ "backupName": name }),
        );
        self.api(VeleroKind::DeleteBackupRequest)
            .create(&PostParams::default(), &obj)
            .await?;

        info!(name, "Backup delete requested");
        Ok(())
    }

    // --- Restores ---

    pub async fn list_restores(&self) -> Result<Vec<RestoreResponse>, ClusterError> {
        let list = self.api(VeleroKind::Restore).list(&ListParams::default()).await?;
        Ok(list.items.iter().map(parse_restore).collect())
    }

    pub async fn get_restore(&self, name: &str) -> Result<RestoreResponse, ClusterError> {
        let obj = self.api(VeleroKind::Restore).get(name).await?;
        Ok(parse_restore(&obj))
    }

    pub async fn create_restore(
        &self,
        req: CreateRestoreRequest,
    ) -> Result<RestoreResponse, ClusterError> {
        let mut spec = serde_json::Map::new();
        spec.insert("backupName".into(), json!(req.backup_name));
        insert_string_list(&mut spec, "includedNamespaces", &req.included_namespaces);
        insert_string_list(&mut spec, "excludedNamespaces", &req.excluded_namespaces);
        insert_string_list(&mut spec, "includedResources", &req.included_resources);
        insert_string_list(&mut spec, "excludedResources", &req.excluded_resources);
        if let Some(restore_pvs) = req.restore_pvs {
            spec.insert("restorePVs".into(), json!(restore_pvs));
        }
        if let Some(mapping) = &req.namespace_mapping {
            if !mapping.is_empty() {
                spec.insert("namespaceMapping".into(), json!(mapping));
            }
        }
        if !req.existing_resource_policy.is_empty() {
            spec.insert(
                "existingResourcePolicy".into(),
                json!(req.existing_resource_policy),
            );
        }

        let name = if req.name.is_empty() {
            format!("{}-restore-{}", req.backup_name, Utc::now().timestamp())
        } else {
            req.name.clone()
        };

        let obj = self.new_object(VeleroKind::Restore, &name, Value::Object(spec));
        let created = self
            .api(VeleroKind::Restore)
            .create(&PostParams::default(), &obj)
            .await?;

        info!(name = %name, "Restore created");
        Ok(parse_restore(&created))
    }

    pub async fn delete_restore(&self, name: &str) -> Result<(), ClusterError> {
        self.api(VeleroKind::Restore)
            .delete(name, &DeleteParams::default())
            .await?;
        info!(name, "Restore deleted");
        Ok(())
    }

    // --- Schedules ---

    pub async fn list_schedules(&self) -> Result<Vec<ScheduleResponse>, ClusterError> {
        let list = self.api(VeleroKind::Schedule).list(&ListParams::default()).await?;
        Ok(list.items.iter().map(parse_schedule).collect())
    }

    pub async fn get_schedule(&self, name: &str) -> Result<ScheduleResponse, ClusterError> {
        let obj = self.api(VeleroKind::Schedule).get(name).await?;
        Ok(parse_schedule(&obj))
    }

    pub async fn create_schedule(
        &self,
        req: CreateScheduleRequest,
    ) -> Result<ScheduleResponse, ClusterError> {
        let mut template = serde_json::Map::new();
        insert_string_list(&mut template, "includedNamespaces", &req.included_namespaces);
        insert_string_list(&mut template, "excludedNamespaces", &req.excluded_namespaces);
        insert_string_list(&mut template, "includedResources", &req.included_resources);
        insert_string_list(&mut template, "excludedResources", &req.excluded_resources);
        if !req.storage_location.is_empty() {
            template.insert("storageLocation".into(), json!(req.storage_location));
        }
        insert_string_list(
            &mut template,
            "volumeSnapshotLocations",
            &req.volume_snapshot_locations,
        );
        if !req.ttl.is_empty() {
            template.insert("ttl".into(), json!(req.ttl));
        }
        if let Some(snapshot_volumes) = req.snapshot_volumes {
            template.insert("snapshotVolumes".into(), json!(snapshot_volumes));
        }
        if let Some(fs_backup) = req.default_volumes_to_fs {
            template.insert("defaultVolumesToFsBackup".into(), json!(fs_backup));
        }

        let mut spec = serde_json::Map::new();
        spec.insert("schedule".into(), json!(req.schedule));
        spec.insert("template".into(), Value::Object(template));
        if req.paused {
            spec.insert("paused".into(), json!(true));
        }

        let obj = self.new_object(VeleroKind::Schedule, &req.name, Value::Object(spec));
        let created = self
            .api(VeleroKind::Schedule)
            .create(&PostParams::default(), &obj)
            .await?;

        info!(name = %req.name, "Schedule created");
        Ok(parse_schedule(&created))
    }

    /// Flips `spec.paused` with a declarative merge patch, so a concurrent
    /// schedule update cannot turn the toggle into a lost write.
    pub async fn toggle_schedule_pause(&self, name: &str) -> Result<ScheduleResponse, ClusterError> {
        let api = self.api(VeleroKind::Schedule);
        let current = api.get(name).await?;
        let paused = nested_bool(&current.data, &["spec", "paused"]);

        let patch = json!({ "spec": { "paused": !paused } });
        let updated = api
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        info!(name, paused = !paused, "Schedule pause toggled");
        Ok(parse_schedule(&updated))
    }

    pub async fn delete_schedule(&self, name: &str) -> Result<(), ClusterError> {
        self.api(VeleroKind::Schedule)
            .delete(name, &DeleteParams::default())
            .await?;
        info!(name, "Schedule deleted");
        Ok(())
    }

    // --- Backup storage locations ---

    pub async fn list_backup_storage_locations(
        &self,
    ) -> Result<Vec<BackupStorageLocationResponse>, ClusterError> {
        let list = self
            .api(VeleroKind::BackupStorageLocation)
            .list(&ListParams::default())
            .await?;
        Ok(list.items.iter().map(parse_bsl).collect())
    }

    pub async fn create_backup_storage_location(
        &self,
        req: CreateBackupStorageLocationRequest,
    ) -> Result<BackupStorageLocationResponse, ClusterError> {
        let mut config: HashMap<String, String> = req.config.clone();
        match req.provider.as_str() {
            "aws" | "velero.io/aws" => {
                if !req.region.is_empty() {
                    config.insert("region".into(), req.region.clone());
                }
                if !req.s3_url.is_empty() {
                    config.insert("s3Url".into(), req.s3_url.clone());
                }
                if let Some(path_style) = req.s3_force_path_style {
                    config.insert("s3ForcePathStyle".into(), path_style.to_string());
                }
            }
            "gcp" | "velero.io/gcp" => {
                if !req.region.is_empty() {
                    config.insert("region".into(), req.region.clone());
                }
            }
            "azure" | "velero.io/azure" => {
                if !req.storage_account.is_empty() {
                    config.insert("storageAccount".into(), req.storage_account.clone());
                }
                if !req.resource_group.is_empty() {
                    config.insert("resourceGroup".into(), req.resource_group.clone());
                }
                if !req.subscription_id.is_empty() {
                    config.insert("subscriptionId".into(), req.subscription_id.clone());
                }
            }
            _ => {}
        }

        let mut object_storage = serde_json::Map::new();
        object_storage.insert("bucket".into(), json!(req.bucket));
        if !req.prefix.is_empty() {
            object_storage.insert("prefix".into(), json!(req.prefix));
        }

        let mut spec = serde_json::Map::new();
        spec.insert("provider".into(), json!(req.provider));
        spec.insert("objectStorage".into(), Value::Object(object_storage));
        if !config.is_empty() {
            spec.insert("config".into(), json!(config));
        }
        if !req.credential.is_empty() {
            spec.insert(
                "credential".into(),
                json!({ "name": req.credential, "key": "cloud" }),
            );
        }
        if req.default {
            spec.insert("default".into(), json!(true));
        }
        let access_mode = if req.access_mode.is_empty() {
            "ReadWrite"
        } else {
            &req.access_mode
        };
        spec.insert("accessMode".into(), json!(access_mode));

        let obj = self.new_object(
            VeleroKind::BackupStorageLocation,
            &req.name,
            Value::Object(spec),
        );
        let created = self
            .api(VeleroKind::BackupStorageLocation)
            .create(&PostParams::default(), &obj)
            .await?;

        info!(name = %req.name, provider = %req.provider, "Backup storage location created");
        Ok(parse_bsl(&created))
    }

    pub async fn update_backup_storage_location(
        &self,
        name: &str,
        req: UpdateBackupStorageLocationRequest,
    ) -> Result<BackupStorageLocationResponse, ClusterError> {
        let mut spec = serde_json::Map::new();
        if !req.access_mode.is_empty() {
            spec.insert("accessMode".into(), json!(req.access_mode));
        }
        if !req.credential.is_empty() {
            spec.insert(
                "credential".into(),
                json!({ "name": req.credential, "key": "cloud" }),
            );
        }
        if let Some(config) = &req.config {
            // merged into the existing config server-side via merge patch
            spec.insert("config".into(), json!(config));
        }
        if let Some(default) = req.default {
            spec.insert("default".into(), json!(default));
        }

        let patch = json!({ "spec": Value::Object(spec) });
        let updated = self
            .api(VeleroKind::BackupStorageLocation)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        info!(name, "Backup storage location updated");
        Ok(parse_bsl(&updated))
    }

    pub async fn delete_backup_storage_location(&self, name: &str) -> Result<(), ClusterError> {
        self.api(VeleroKind::BackupStorageLocation)
            .delete(name, &DeleteParams::default())
            .await?;
        info!(name, "Backup storage location deleted");
        Ok(())
    }

    // --- Volume snapshot locations ---

    pub async fn list_volume_snapshot_locations(
        &self,
    ) -> Result<Vec<VolumeSnapshotLocationResponse>, ClusterError> {
        let list = self
            .api(VeleroKind::VolumeSnapshotLocation)
            .list(&ListParams::default())
            .await?;
        Ok(list.items.iter().map(parse_vsl).collect())
    }

    pub async fn create_volume_snapshot_location(
        &self,
        req: CreateVolumeSnapshotLocationRequest,
    ) -> Result<VolumeSnapshotLocationResponse, ClusterError> {
        let mut config: HashMap<String, String> = req.config.clone();
        match req.provider.as_str() {
            "aws" | "velero.io/aws" => {
                if !req.region.is_empty() {
                    config.insert("region".into(), req.region.clone());
                }
            }
            "azure" | "velero.io/azure" => {
                if !req.resource_group.is_empty() {
                    config.insert("resourceGroup".into(), req.resource_group.clone());
                }
                if !req.subscription_id.is_empty() {
                    config.insert("subscriptionId".into(), req.subscription_id.clone());
                }
            }
            _ => {}
        }

        let mut spec = serde_json::Map::new();
        spec.insert("provider".into(), json!(req.provider));
        if !config.is_empty() {
            spec.insert("config".into(), json!(config));
        }
        if !req.credential.is_empty() {
            spec.insert(
                "credential".into(),
                json!({ "name": req.credential, "key": "cloud" }),
            );
        }

        let obj = self.new_object(
            VeleroKind::VolumeSnapshotLocation,
            &req.name,
            Value::Object(spec),
        );
        let created = self
            .api(VeleroKind::VolumeSnapshotLocation)
            .create(&PostParams::default(), &obj)
            .await?;

        info!(name = %req.name, provider = %req.provider, "Volume snapshot location created");
        Ok(parse_vsl(&created))
    }

    pub async fn update_volume_snapshot_location(
        &self,
        name: &str,
        req: UpdateVolumeSnapshotLocationRequest,
    ) -> Result<VolumeSnapshotLocationResponse, ClusterError> {
        let mut spec = serde_json::Map::new();
        if !req.credential.is_empty() {
            spec.insert(
                "credential".into(),
                json!({ "name": req.credential, "key": "cloud" }),
            );
        }
        if let Some(config) = &req.config {
            spec.insert("config".into(), json!(config));
        }

        let patch = json!({ "spec": Value::Object(spec) });
        let updated = self
            .api(VeleroKind::VolumeSnapshotLocation)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        info!(name, "Volume snapshot location updated");
        Ok(parse_vsl(&updated))
    }

    pub async fn delete_volume_snapshot_location(&self, name: &str) -> Result<(), ClusterError> {
        self.api(VeleroKind::VolumeSnapshotLocation)
            .delete(name, &DeleteParams::default())
            .await?;
        info!(name, "Volume snapshot location deleted");
        Ok(())
    }

    // --- Dashboard stats ---

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ClusterError> {
        let backups = self.list_backups().await?;
        let restores = self.list_restores().await?;
        let schedules = self.list_schedules().await?;
        let bsls = self.list_backup_storage_locations().await?;

        let mut stats = DashboardStats {
            total_backups: backups.len() as i64,
            total_restores: restores.len() as i64,
            total_schedules: schedules.len() as i64,
            storage_locations: bsls.len() as i64,
            ..Default::default()
        };

        for backup in &backups {
            match backup.phase.as_str() {
                "Completed" => stats.completed_backups += 1,
                "Failed" | "PartiallyFailed" => stats.failed_backups += 1,
                _ => {}
            }
        }
        for schedule in &schedules {
            if !schedule.paused {
                stats.active_schedules += 1;
            }
        }
        for bsl in &bsls {
            if bsl.phase == "Available" {
                stats.healthy_locations += 1;
            }
        }

        Ok(stats)
    }

    // --- Backup comparison ---

    pub async fn compare_backups(
        &self,
        name1: &str,
        name2: &str,
    ) -> Result<BackupComparisonResponse, ClusterError> {
        let backup1 = self.get_backup(name1).await?;
        let backup2 = self.get_backup(name2).await?;

        let diff = BackupDiff {
            items_diff: backup2.items_backed_up - backup1.items_backed_up,
            errors_diff: backup2.errors - backup1.errors,
            warnings_diff: backup2.warnings - backup1.warnings,
            size_diff: backup2.size_bytes.unwrap_or(0) - backup1.size_bytes.unwrap_or(0),
            added_namespaces: diff_slices(&backup1.included_namespaces, &backup2.included_namespaces),
            removed_namespaces: diff_slices(
                &backup2.included_namespaces,
                &backup1.included_namespaces,
            ),
            added_resources: diff_slices(&backup1.included_resources, &backup2.included_resources),
            removed_resources: diff_slices(&backup2.included_resources, &backup1.included_resources),
            same_configuration: backup1.storage_location == backup2.storage_location
                && backup1.ttl == backup2.ttl,
            storage_location_diff: backup1.storage_location != backup2.storage_location,
            ttl_diff: backup1.ttl != backup2.ttl,
        };

        Ok(BackupComparisonResponse {
            backup1: backup_summary(&backup1),
            backup2: backup_summary(&backup2),
            diff,
        })
    }

    // --- Backup logs ---

    /// Fetches backup logs through a DownloadRequest: create the request,
    /// poll its status until `Processed` (30 s deadline, 1 s cadence), fetch
    /// the signed URL and gunzip the payload when it carries the gzip magic.
    pub async fn backup_logs(&self, backup_name: &str) -> Result<String, ClusterError> {
        let request_name = format!("{}-logs-{}", backup_name, Utc::now().timestamp());
        let obj = self.new_object(
            VeleroKind::DownloadRequest,
            &request_name,
            json!({ "target": { "kind": "BackupLog", "name": backup_name } }),
        );

        let api = self.api(VeleroKind::DownloadRequest);
        api.create(&PostParams::default(), &obj).await?;
        info!(request = %request_name, backup = backup_name, "Download request created");

        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.tick().await;

        let download_url = loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(ClusterError::LogDownload(
                    "timeout waiting for download request to be ready".to_string(),
                ));
            }
            ticker.tick().await;

            let Ok(request) = api.get(&request_name).await else {
                continue;
            };
            if nested_str(&request.data, &["status", "phase"]) == "Processed" {
                let url = nested_str(&request.data, &["status", "downloadURL"]);
                if !url.is_empty() {
                    break url;
                }
            }
        };

        let body = self
            .http
            .get(&download_url)
            .send()
            .await
            .map_err(|e| ClusterError::LogDownload(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| ClusterError::LogDownload(e.to_string()))?;

        let logs = decode_log_body(&body)?;

        let _ = api.delete(&request_name, &DeleteParams::default()).await;
        Ok(logs)
    }

    fn new_object(&self, kind: VeleroKind, name: &str, spec: Value) -> DynamicObject {
        let mut obj = DynamicObject::new(name, &kind.resource()).within(&self.namespace);
        obj.data = json!({ "spec": spec });
        obj
    }
}

fn decode_log_body(body: &[u8]) -> Result<String, ClusterError> {
    use std::io::Read;

    if body.len() > 2 && body[0] == 0x1f && body[1] == 0x8b {
        let mut decoder = GzDecoder::new(body);
        let mut out = String::new();
        decoder
            .read_to_string(&mut out)
            .map_err(|e| ClusterError::LogDownload(format!("failed to decompress logs: {e}")))?;
        Ok(out)
    } else {
        Ok(String::from_utf8_lossy(body).into_owned())
    }
}

fn backup_summary(backup: &BackupResponse) -> BackupSummary {
    BackupSummary {
        name: backup.name.clone(),
        phase: backup.phase.clone(),
        created: backup
            .created
            .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_default(),
        items_backed_up: backup.items_backed_up,
        total_items: backup.total_items,
        errors: backup.errors,
        warnings: backup.warnings,
        size_bytes: backup.size_bytes,
        storage_location: backup.storage_location.clone(),
        included_namespaces: backup.included_namespaces.clone(),
        excluded_namespaces: backup.excluded_namespaces.clone(),
        included_resources: backup.included_resources.clone(),
        excluded_resources: backup.excluded_resources.clone(),
        ttl: backup.ttl.clone(),
    }
}

/// Elements of `second` that are not in `first`.
fn diff_slices(first: &[String], second: &[String]) -> Vec<String> {
    let set: std::collections::HashSet<&String> = first.iter().collect();
    second.iter().filter(|s| !set.contains(s)).cloned().collect()
}

fn insert_string_list(spec: &mut serde_json::Map<String, Value>, key: &str, values: &[String]) {
    if !values.is_empty() {
        spec.insert(key.to_string(), json!(values));
    }
}

// --- Projection helpers ---

fn nested<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

fn nested_str(value: &Value, path: &[&str]) -> String {
    nested(value, path)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn nested_i64(value: &Value, path: &[&str]) -> i64 {
    nested(value, path).and_then(Value::as_i64).unwrap_or(0)
}

fn nested_i64_opt(value: &Value, path: &[&str]) -> Option<i64> {
    nested(value, path).and_then(Value::as_i64)
}

fn nested_bool(value: &Value, path: &[&str]) -> bool {
    nested(value, path).and_then(Value::as_bool).unwrap_or(false)
}

fn nested_bool_opt(value: &Value, path: &[&str]) -> Option<bool> {
    nested(value, path).and_then(Value::as_bool)
}

fn nested_string_vec(value: &Value, path: &[&str]) -> Vec<String> {
    nested(value, path)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn nested_string_map(value: &Value, path: &[&str]) -> Option<HashMap<String, String>> {
    let map = nested(value, path)?.as_object()?;
    Some(
        map.iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
    )
}

fn nested_time(value: &Value, path: &[&str]) -> Option<DateTime<Utc>> {
    let raw = nested(value, path)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn object_labels(obj: &DynamicObject) -> Option<HashMap<String, String>> {
    obj.metadata
        .labels
        .as_ref()
        .map(|labels| labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn object_created(obj: &DynamicObject) -> Option<DateTime<Utc>> {
    obj.metadata.creation_timestamp.as_ref().map(|t| t.0)
}

pub fn parse_backup(obj: &DynamicObject) -> BackupResponse {
    let data = &obj.data;
    BackupResponse {
        name: obj.metadata.name.clone().unwrap_or_default(),
        namespace: obj.metadata.namespace.clone().unwrap_or_default(),
        phase: nested_str(data, &["status", "phase"]),
        errors: nested_i64(data, &["status", "errors"]),
        warnings: nested_i64(data, &["status", "warnings"]),
        created: object_created(obj),
        started: nested_time(data, &["status", "startTimestamp"]),
        completed: nested_time(data, &["status", "completionTimestamp"]),
        expiration: nested_time(data, &["status", "expiration"]),
        included_namespaces: nested_string_vec(data, &["spec", "includedNamespaces"]),
        excluded_namespaces: nested_string_vec(data, &["spec", "excludedNamespaces"]),
        included_resources: nested_string_vec(data, &["spec", "includedResources"]),
        excluded_resources: nested_string_vec(data, &["spec", "excludedResources"]),
        storage_location: nested_str(data, &["spec", "storageLocation"]),
        ttl: nested_str(data, &["spec", "ttl"]),
        labels: object_labels(obj),
        items_backed_up: nested_i64(data, &["status", "progress", "itemsBackedUp"]),
        total_items: nested_i64(data, &["status", "progress", "totalItems"]),
        // Only reported when upstream tracks it; clients render "unknown"
        // otherwise.
        size_bytes: nested_i64_opt(data, &["status", "backupSize"]),
        snapshot_volumes: nested_bool_opt(data, &["spec", "snapshotVolumes"]),
        default_volumes_to_fs: nested_bool_opt(data, &["spec", "defaultVolumesToFsBackup"]),
    }
}

pub fn parse_restore(obj: &DynamicObject) -> RestoreResponse {
    let data = &obj.data;
    RestoreResponse {
        name: obj.metadata.name.clone().unwrap_or_default(),
        namespace: obj.metadata.namespace.clone().unwrap_or_default(),
        phase: nested_str(data, &["status", "phase"]),
        errors: nested_i64(data, &["status", "errors"]),
        warnings: nested_i64(data, &["status", "warnings"]),
        backup_name: nested_str(data, &["spec", "backupName"]),
        created: object_created(obj),
        started: nested_time(data, &["status", "startTimestamp"]),
        completed: nested_time(data, &["status", "completionTimestamp"]),
        included_namespaces: nested_string_vec(data, &["spec", "includedNamespaces"]),
        excluded_namespaces: nested_string_vec(data, &["spec", "excludedNamespaces"]),
        included_resources: nested_string_vec(data, &["spec", "includedResources"]),
        excluded_resources: nested_string_vec(data, &["spec", "excludedResources"]),
        restore_pvs: nested_bool_opt(data, &["spec", "restorePVs"]),
        existing_resource_policy: nested_str(data, &["spec", "existingResourcePolicy"]),
        namespace_mapping: nested_string_map(data, &["spec", "namespaceMapping"]),
        labels: object_labels(obj),
        items_restored: nested_i64(data, &["status", "progress", "itemsRestored"]),
        total_items: nested_i64(data, &["status", "progress", "totalItems"]),
    }
}

pub fn parse_schedule(obj: &DynamicObject) -> ScheduleResponse {
    let data = &obj.data;
    ScheduleResponse {
        name: obj.metadata.name.clone().unwrap_or_default(),
        namespace: obj.metadata.namespace.clone().unwrap_or_default(),
        phase: nested_str(data, &["status", "phase"]),
        schedule: nested_str(data, &["spec", "schedule"]),
        paused: nested_bool(data, &["spec", "paused"]),
        last_backup: nested_time(data, &["status", "lastBackup"]),
        created: object_created(obj),
        included_namespaces: nested_string_vec(data, &["spec", "template", "includedNamespaces"]),
        excluded_namespaces: nested_string_vec(data, &["spec", "template", "excludedNamespaces"]),
        ttl: nested_str(data, &["spec", "template", "ttl"]),
        storage_location: nested_str(data, &["spec", "template", "storageLocation"]),
        labels: object_labels(obj),
    }
}

pub fn parse_bsl(obj: &DynamicObject) -> BackupStorageLocationResponse {
    let data = &obj.data;
    BackupStorageLocationResponse {
        name: obj.metadata.name.clone().unwrap_or_default(),
        namespace: obj.metadata.namespace.clone().unwrap_or_default(),
        phase: nested_str(data, &["status", "phase"]),
        provider: nested_str(data, &["spec", "provider"]),
        bucket: nested_str(data, &["spec", "objectStorage", "bucket"]),
        prefix: nested_str(data, &["spec", "objectStorage", "prefix"]),
        access_mode: nested_str(data, &["spec", "accessMode"]),
        default: nested_bool(data, &["spec", "default"]),
        last_validated: nested_time(data, &["status", "lastValidationTime"]),
        config: nested_string_map(data, &["spec", "config"]),
        labels: object_labels(obj),
    }
}

pub fn parse_vsl(obj: &DynamicObject) -> VolumeSnapshotLocationResponse {
    let data = &obj.data;
    VolumeSnapshotLocationResponse {
        name: obj.metadata.name.clone().unwrap_or_default(),
        namespace: obj.metadata.namespace.clone().unwrap_or_default(),
        provider: nested_str(data, &["spec", "provider"]),
        config: nested_string_map(data, &["spec", "config"]),
        labels: object_labels(obj),
    }
}

/// Projects a watched object into the DTO broadcast to browser clients.
pub fn project(kind: ResourceKind, obj: &DynamicObject) -> Value {
    let projected = match kind {
        ResourceKind::Backup => serde_json::to_value(parse_backup(obj)),
        ResourceKind::Restore => serde_json::to_value(parse_restore(obj)),
        ResourceKind::Schedule => serde_json::to_value(parse_schedule(obj)),
        ResourceKind::Bsl => serde_json::to_value(parse_bsl(obj)),
    };
    projected.unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backup_fixture() -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "velero.io/v1",
            "kind": "Backup",
            "metadata": {
                "name": "nightly-20250801",
                "namespace": "velero",
                "creationTimestamp": "2025-08-01T02:00:00Z",
                "labels": { "velero.io/schedule-name": "nightly" }
            },
            "spec": {
                "includedNamespaces": ["default", "apps"],
                "storageLocation": "primary",
                "ttl": "720h0m0s",
                "snapshotVolumes": false
            },
            "status": {
                "phase": "Completed",
                "errors": 0,
                "warnings": 2,
                "startTimestamp": "2025-08-01T02:00:01Z",
                "completionTimestamp": "2025-08-01T02:03:12Z",
                "progress": { "itemsBackedUp": 142, "totalItems": 142 }
            }
        }))
        .unwrap()
    }

    #[test]
    fn parses_backup_fields() {
        let backup = parse_backup(&backup_fixture());

        assert_eq!(backup.name, "nightly-20250801");
        assert_eq!(backup.phase, "Completed");
        assert_eq!(backup.warnings, 2);
        assert_eq!(backup.items_backed_up, 142);
        assert_eq!(backup.storage_location, "primary");
        assert_eq!(backup.ttl, "720h0m0s");
        assert_eq!(backup.included_namespaces, vec!["default", "apps"]);
        assert_eq!(backup.snapshot_volumes, Some(false));
        assert!(backup.created.is_some());
        assert!(backup.started.is_some());
        assert!(backup.expiration.is_none());
    }

    #[test]
    fn size_bytes_is_absent_unless_reported() {
        let backup = parse_backup(&backup_fixture());
        assert_eq!(backup.size_bytes, None);

        let mut with_size = backup_fixture();
        with_size.data["status"]["backupSize"] = json!(123456);
        assert_eq!(parse_backup(&with_size).size_bytes, Some(123456));
    }

    #[test]
    fn parses_schedule_template_fields() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "velero.io/v1",
            "kind": "Schedule",
            "metadata": { "name": "nightly", "namespace": "velero" },
            "spec": {
                "schedule": "0 2 * * *",
                "paused": true,
                "template": {
                    "includedNamespaces": ["default"],
                    "storageLocation": "primary",
                    "ttl": "168h"
                }
            },
            "status": { "phase": "Enabled", "lastBackup": "2025-08-01T02:00:00Z" }
        }))
        .unwrap();

        let schedule = parse_schedule(&obj);
        assert_eq!(schedule.schedule, "0 2 * * *");
        assert!(schedule.paused);
        assert_eq!(schedule.storage_location, "primary");
        assert_eq!(schedule.ttl, "168h");
        assert!(schedule.last_backup.is_some());
    }

    #[test]
    fn parses_bsl_object_storage() {
        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "velero.io/v1",
            "kind": "BackupStorageLocation",
            "metadata": { "name": "primary", "namespace": "velero" },
            "spec": {
                "provider": "aws",
                "objectStorage": { "bucket": "backups", "prefix": "prod/" },
                "accessMode": "ReadWrite",
                "default": true,
                "config": { "region": "eu-west-1" }
            },
            "status": { "phase": "Available" }
        }))
        .unwrap();

        let bsl = parse_bsl(&obj);
        assert_eq!(bsl.provider, "aws");
        assert_eq!(bsl.bucket, "backups");
        assert_eq!(bsl.prefix, "prod/");
        assert!(bsl.default);
        assert_eq!(bsl.config.unwrap()["region"], "eu-west-1");
    }

    #[test]
    fn decode_log_body_detects_gzip_magic() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"log line one\nlog line two\n").unwrap();
        let gzipped = encoder.finish().unwrap();

        assert_eq!(
            decode_log_body(&gzipped).unwrap(),
            "log line one\nlog line two\n"
        );
        assert_eq!(decode_log_body(b"plain text").unwrap(), "plain text");
    }

    #[test]
    fn diff_slices_returns_additions_only() {
        let first = vec!["a".to_string(), "b".to_string()];
        let second = vec!["b".to_string(), "c".to_string()];
        assert_eq!(diff_slices(&first, &second), vec!["c".to_string()]);
        assert_eq!(diff_slices(&second, &first), vec!["a".to_string()]);
    }
}
