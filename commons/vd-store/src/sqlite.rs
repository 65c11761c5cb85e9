//! Embedded relational back-end. One `clusters` and one `webhooks` table,
//! credential blobs encrypted with [`CredentialCipher`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use vd_models::{
    ClusterRecord, ClusterStatus, ClusterSummary, CreateClusterRequest, CreateWebhookRequest,
    EventType, UpdateClusterRequest, UpdateWebhookRequest, WebhookConfig, WebhookType,
};

use crate::crypto::CredentialCipher;
use crate::error::{StoreError, StoreResult};
use crate::traits::{ClusterStore, WebhookStore};

const DEFAULT_CLUSTER_DB: &str = "./clusters.db";
const DEFAULT_WEBHOOK_DB: &str = "./webhooks.db";

pub struct SqliteClusterStore {
    conn: Mutex<Connection>,
    cipher: CredentialCipher,
}

impl SqliteClusterStore {
    pub fn new(db_path: &str, encryption_key: Option<&str>) -> StoreResult<Self> {
        let path = if db_path.is_empty() {
            DEFAULT_CLUSTER_DB
        } else {
            db_path
        };

        let conn = Connection::open(path)
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS clusters (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                kubeconfig_encrypted BLOB NOT NULL,
                namespace TEXT NOT NULL,
                status TEXT NOT NULL,
                status_message TEXT,
                is_default INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_health_check TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_clusters_default ON clusters(is_default);
            CREATE INDEX IF NOT EXISTS idx_clusters_name ON clusters(name);
            "#,
        )?;

        info!(path, "SQLite cluster store initialized");

        Ok(SqliteClusterStore {
            conn: Mutex::new(conn),
            cipher: CredentialCipher::new(encryption_key),
        })
    }
}

fn parse_status(raw: &str) -> ClusterStatus {
    raw.parse().unwrap_or(ClusterStatus::Pending)
}

fn parse_time(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("invalid timestamp: {e}")))
}

#[async_trait::async_trait]
impl ClusterStore for SqliteClusterStore {
    async fn create(&self, req: CreateClusterRequest) -> StoreResult<ClusterRecord> {
        let id = Uuid::new_v4().to_string();
        let encrypted = self.cipher.encrypt(req.kubeconfig.as_bytes())?;
        let now = Utc::now();

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if req.set_as_default {
            tx.execute("UPDATE clusters SET is_default = 0", [])?;
        }
        tx.execute(
            "INSERT INTO clusters (id, name, kubeconfig_encrypted, namespace, status, is_default, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                req.name,
                encrypted,
                req.namespace,
                ClusterStatus::Pending.to_string(),
                req.set_as_default as i64,
                now.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

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
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT id, name, kubeconfig_encrypted, namespace, status, status_message,
                        is_default, created_at, last_health_check
                 FROM clusters WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, Option<String>>(8)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("cluster {id}")))?;

        let credential_blob = self.cipher.decrypt(&row.2)?;

        Ok(ClusterRecord {
            id: row.0,
            name: row.1,
            credential_blob,
            namespace: row.3,
            status: parse_status(&row.4),
            status_message: row.5.unwrap_or_default(),
            is_default: row.6 == 1,
            created_at: parse_time(&row.7)?,
            last_health_check: row.8.as_deref().map(parse_time).transpose()?,
        })
    }

    async fn list(&self) -> StoreResult<Vec<ClusterSummary>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, namespace, status, status_message, is_default,
                    created_at, last_health_check
             FROM clusters ORDER BY is_default DESC, name ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let row = row?;
            summaries.push(ClusterSummary {
                id: row.0,
                name: row.1,
                namespace: row.2,
                status: parse_status(&row.3),
                status_message: row.4.unwrap_or_default(),
                is_default: row.5 == 1,
                created_at: parse_time(&row.6)?,
                last_health_check: row.7.as_deref().map(parse_time).transpose()?,
            });
        }
        Ok(summaries)
    }

    async fn update(&self, id: &str, req: UpdateClusterRequest) -> StoreResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        if req.set_as_default == Some(true) {
            tx.execute("UPDATE clusters SET is_default = 0", [])?;
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(name) = &req.name {
            sets.push("name = ?");
            args.push(Box::new(name.clone()));
        }
        if let Some(kubeconfig) = &req.kubeconfig {
            let encrypted = self.cipher.encrypt(kubeconfig.as_bytes())?;
            sets.push("kubeconfig_encrypted = ?");
            args.push(Box::new(encrypted));
        }
        if let Some(namespace) = &req.namespace {
            sets.push("namespace = ?");
            args.push(Box::new(namespace.clone()));
        }
        if let Some(is_default) = req.set_as_default {
            sets.push("is_default = ?");
            args.push(Box::new(is_default as i64));
        }

        if sets.is_empty() {
            return Ok(());
        }

        let query = format!("UPDATE clusters SET {} WHERE id = ?", sets.join(", "));
        args.push(Box::new(id.to_string()));

        let affected = tx.execute(
            &query,
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("cluster {id}")));
        }

        tx.commit()?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        let affected = conn.execute("DELETE FROM clusters WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("cluster {id}")));
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: ClusterStatus,
        message: &str,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE clusters SET status = ?1, status_message = ?2, last_health_check = ?3
             WHERE id = ?4",
            params![status.to_string(), message, Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    async fn get_default(&self) -> StoreResult<ClusterRecord> {
        let id = {
            let conn = self.conn.lock().await;
            conn.query_row(
                "SELECT id FROM clusters WHERE is_default = 1 LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound("no default cluster configured".to_string()))?
        };
        self.get(&id).await
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct SqliteWebhookStore {
    conn: Mutex<Connection>,
}

impl SqliteWebhookStore {
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let path = if db_path.is_empty() {
            DEFAULT_WEBHOOK_DB
        } else {
            db_path
        };

        let conn = Connection::open(path)
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS webhooks (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                url TEXT NOT NULL,
                events TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_sent_at TEXT,
                last_status TEXT,
                last_error TEXT
            );
            "#,
        )?;

        Ok(SqliteWebhookStore {
            conn: Mutex::new(conn),
        })
    }
}

type WebhookRow = (
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn webhook_from_row(row: WebhookRow) -> StoreResult<WebhookConfig> {
    let webhook_type: WebhookType = serde_json::from_value(serde_json::Value::String(row.2))?;
    let events: Vec<EventType> = serde_json::from_str(&row.4)?;

    Ok(WebhookConfig {
        id: row.0,
        name: row.1,
        webhook_type,
        url: row.3,
        events,
        enabled: row.5 == 1,
        created_at: parse_time(&row.6)?,
        updated_at: parse_time(&row.7)?,
        last_sent_at: row.8.as_deref().map(parse_time).transpose()?,
        last_status: row.9.unwrap_or_default(),
        last_error: row.10.unwrap_or_default(),
    })
}

fn read_webhook_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WebhookRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

const WEBHOOK_COLUMNS: &str = "id, name, type, url, events, enabled, created_at, updated_at, \
                               last_sent_at, last_status, last_error";

#[async_trait::async_trait]
impl WebhookStore for SqliteWebhookStore {
    async fn create(&self, req: CreateWebhookRequest) -> StoreResult<WebhookConfig> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let events_json = serde_json::to_string(&req.events)?;

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO webhooks (id, name, type, url, events, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                req.name,
                req.webhook_type.as_str(),
                req.url,
                events_json,
                req.enabled as i64,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

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
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                &format!("SELECT {WEBHOOK_COLUMNS} FROM webhooks WHERE id = ?1"),
                params![id],
                read_webhook_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("webhook {id}")))?;
        webhook_from_row(row)
    }

    async fn list(&self) -> StoreResult<Vec<WebhookConfig>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map([], read_webhook_row)?;

        let mut webhooks = Vec::new();
        for row in rows {
            webhooks.push(webhook_from_row(row?)?);
        }
        Ok(webhooks)
    }

    async fn update(&self, id: &str, req: UpdateWebhookRequest) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        let mut sets: Vec<&str> = vec!["updated_at = ?"];
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(Utc::now().to_rfc3339())];

        if let Some(name) = &req.name {
            sets.push("name = ?");
            args.push(Box::new(name.clone()));
        }
        if let Some(webhook_type) = req.webhook_type {
            sets.push("type = ?");
            args.push(Box::new(webhook_type.as_str()));
        }
        if let Some(url) = &req.url {
            sets.push("url = ?");
            args.push(Box::new(url.clone()));
        }
        if let Some(events) = &req.events {
            sets.push("events = ?");
            args.push(Box::new(serde_json::to_string(events)?));
        }
        if let Some(enabled) = req.enabled {
            sets.push("enabled = ?");
            args.push(Box::new(enabled as i64));
        }

        let query = format!("UPDATE webhooks SET {} WHERE id = ?", sets.join(", "));
        args.push(Box::new(id.to_string()));

        let affected = conn.execute(
            &query,
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("webhook {id}")));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        let affected = conn.execute("DELETE FROM webhooks WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("webhook {id}")));
        }
        Ok(())
    }

    async fn update_delivery_status(
        &self,
        id: &str,
        status: &str,
        error_message: &str,
    ) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE webhooks SET last_sent_at = ?1, last_status = ?2, last_error = ?3,
                    updated_at = ?4 WHERE id = ?5",
            params![now, status, error_message, now, id],
        )?;
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_store() -> (tempfile::TempDir, SqliteClusterStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clusters.db");
        let store = SqliteClusterStore::new(path.to_str().unwrap(), Some("test-key")).unwrap();
        (dir, store)
    }

    fn create_req(name: &str, default: bool) -> CreateClusterRequest {
        CreateClusterRequest {
            name: name.to_string(),
            namespace: "velero".to_string(),
            set_as_default: default,
            kubeconfig: format!("kubeconfig-for-{name}"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_get_round_trips_credential() {
        let (_dir, store) = cluster_store();

        let created = store.create(create_req("alpha", true)).await.unwrap();
        let fetched = store.get(&created.id).await.unwrap();

        assert_eq!(fetched.name, "alpha");
        assert_eq!(fetched.credential_blob, b"kubeconfig-for-alpha");
        assert_eq!(fetched.status, ClusterStatus::Pending);
        assert!(fetched.is_default);
    }

    #[tokio::test]
    async fn at_most_one_default_after_any_sequence() {
        let (_dir, store) = cluster_store();

        let a = store.create(create_req("a", true)).await.unwrap();
        let b = store.create(create_req("b", true)).await.unwrap();

        let defaults: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, b.id);

        store
            .update(
                &a.id,
                UpdateClusterRequest {
                    set_as_default: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let defaults: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, a.id);

        let default = store.get_default().await.unwrap();
        assert_eq!(default.id, a.id);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let (_dir, store) = cluster_store();

        store.create(create_req("same", false)).await.unwrap();
        let err = store.create(create_req("same", false)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn delete_missing_returns_not_found() {
        let (_dir, store) = cluster_store();
        let err = store.delete("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_orders_default_first_then_name() {
        let (_dir, store) = cluster_store();

        store.create(create_req("zeta", false)).await.unwrap();
        store.create(create_req("mid", true)).await.unwrap();
        store.create(create_req("alpha", false)).await.unwrap();

        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["mid", "alpha", "zeta"]);
    }

    #[tokio::test]
    async fn status_updates_persist_with_health_check_time() {
        let (_dir, store) = cluster_store();

        let created = store.create(create_req("c", false)).await.unwrap();
        store
            .update_status(&created.id, ClusterStatus::Error, "dial tcp: refused")
            .await
            .unwrap();

        let fetched = store.get(&created.id).await.unwrap();
        assert_eq!(fetched.status, ClusterStatus::Error);
        assert_eq!(fetched.status_message, "dial tcp: refused");
        assert!(fetched.last_health_check.is_some());
    }

    #[tokio::test]
    async fn altered_ciphertext_fails_decrypt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clusters.db");
        let store = SqliteClusterStore::new(path.to_str().unwrap(), Some("key")).unwrap();
        let created = store.create(create_req("x", false)).await.unwrap();

        {
            let conn = store.conn.lock().await;
            conn.execute(
                "UPDATE clusters SET kubeconfig_encrypted = ?1 WHERE id = ?2",
                params![vec![0u8; 40], created.id],
            )
            .unwrap();
        }

        assert!(matches!(
            store.get(&created.id).await.unwrap_err(),
            StoreError::DecryptFailed
        ));
    }

    #[tokio::test]
    async fn webhook_crud_and_delivery_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webhooks.db");
        let store = SqliteWebhookStore::new(path.to_str().unwrap()).unwrap();

        let created = store
            .create(CreateWebhookRequest {
                name: "ops".to_string(),
                webhook_type: WebhookType::Slack,
                url: "https://hooks.example/w".to_string(),
                events: vec![EventType::BackupFailed],
                enabled: true,
            })
            .await
            .unwrap();

        let fetched = store.get(&created.id).await.unwrap();
        assert_eq!(fetched.url, "https://hooks.example/w");
        assert_eq!(fetched.events, vec![EventType::BackupFailed]);
        assert!(fetched.last_sent_at.is_none());

        store
            .update(
                &created.id,
                UpdateWebhookRequest {
                    enabled: Some(false),
                    events: Some(vec![EventType::BackupFailed, EventType::RestoreFailed]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        store
            .update_delivery_status(&created.id, "error", "status 500")
            .await
            .unwrap();

        let fetched = store.get(&created.id).await.unwrap();
        assert!(!fetched.enabled);
        assert_eq!(fetched.events.len(), 2);
        assert_eq!(fetched.last_status, "error");
        assert_eq!(fetched.last_error, "status 500");
        assert!(fetched.last_sent_at.is_some());

        store.delete(&created.id).await.unwrap();
        assert!(matches!(
            store.get(&created.id).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
