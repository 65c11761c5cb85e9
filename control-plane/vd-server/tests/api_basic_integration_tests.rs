//! Router-level tests over sqlite-backed state. No target cluster is
//! involved: these exercise the HTTP surface, role-free (`none`) auth mode,
//! the cluster registry and the webhook store end to end.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use vd_server::cluster::ClusterManager;
use vd_server::config::{AuthConfig, AuthMode, ServerConfig};
use vd_server::hub::Hub;
use vd_server::notify::Notifier;
use vd_server::services::Aggregator;
use vd_server::{ApiServer, AppState};
use vd_store::sqlite::{SqliteClusterStore, SqliteWebhookStore};
use vd_store::{ClusterStore, WebhookStore};

fn test_router(dir: &tempfile::TempDir) -> Router {
    let cluster_db = dir.path().join("clusters.db");
    let webhook_db = dir.path().join("webhooks.db");

    let cluster_store: Arc<dyn ClusterStore> = Arc::new(
        SqliteClusterStore::new(cluster_db.to_str().unwrap(), Some("integration-test-key"))
            .unwrap(),
    );
    let webhook_store: Arc<dyn WebhookStore> =
        Arc::new(SqliteWebhookStore::new(webhook_db.to_str().unwrap()).unwrap());

    let notifier = Notifier::new(webhook_store);
    let hub = Hub::new();
    let manager = ClusterManager::new(cluster_store, Arc::clone(&hub), None);

    let state = AppState {
        manager: Arc::clone(&manager),
        aggregator: Arc::new(Aggregator::new(manager)),
        hub,
        notifier,
        auth: Arc::new(AuthConfig {
            mode: AuthMode::None,
            jwt_secret: String::new(),
            jwt_expiration: Duration::from_secs(3600),
        }),
    };

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        allowed_origins: vec!["http://localhost:3000".to_string()],
    };
    ApiServer::new(state, config).into_router()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn healthz_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(&dir);

    let response = router.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn auth_config_reports_mode() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(&dir);

    let response = router.oneshot(get("/api/auth/config")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"mode": "none"}));
}

#[tokio::test]
async fn cluster_crud_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(&dir);

    // empty registry
    let response = router.clone().oneshot(get("/api/clusters")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));

    // missing credentials are rejected
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/clusters",
            serde_json::json!({"name": "a", "namespace": "velero"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // create with a kubeconfig blob
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/clusters",
            serde_json::json!({
                "name": "alpha",
                "namespace": "velero",
                "setAsDefault": true,
                "kubeconfig": "apiVersion: v1\nkind: Config\n"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["name"], "alpha");
    assert_eq!(created["isDefault"], true);
    assert_eq!(created["status"], "pending");
    assert!(created.get("kubeconfig").is_none());
    let id = created["id"].as_str().unwrap().to_string();

    // duplicate names conflict
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/clusters",
            serde_json::json!({
                "name": "alpha",
                "namespace": "velero",
                "kubeconfig": "apiVersion: v1\nkind: Config\n"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // fetch one summary
    let response = router
        .clone()
        .oneshot(get(&format!("/api/clusters/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "alpha");

    // delete, then the record is gone
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/clusters/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/clusters/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resource_reads_require_a_connected_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(&dir);

    for uri in [
        "/api/backups",
        "/api/restores",
        "/api/schedules",
        "/api/settings/backup-locations",
        "/api/dashboard/stats",
    ] {
        let response = router.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri: {uri}");
    }

    // the aggregator path degrades to empty results instead
    let response = router
        .clone()
        .oneshot(get("/api/backups?cluster=all"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));

    let response = router
        .clone()
        .oneshot(get("/api/backups/shared"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn webhook_crud_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(&dir);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/notifications/webhooks",
            serde_json::json!({
                "name": "ops-alerts",
                "type": "slack",
                "url": "https://hooks.example/T000/B000",
                "events": ["backup_failed"],
                "enabled": true
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["type"], "slack");
    let id = created["id"].as_str().unwrap().to_string();

    // read back with the URL merged in
    let response = router
        .clone()
        .oneshot(get("/api/notifications/webhooks"))
        .await
        .unwrap();
    let listed = body_json(response).await;
    assert_eq!(listed[0]["url"], "https://hooks.example/T000/B000");
    assert_eq!(listed[0]["events"], serde_json::json!(["backup_failed"]));

    // toggle off
    let response = router
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/notifications/webhooks/{id}"),
            serde_json::json!({"enabled": false}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // delete is not idempotent: the second call is a 404
    let delete_req = || {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/notifications/webhooks/{id}"))
            .body(Body::empty())
            .unwrap()
    };
    let response = router.clone().oneshot(delete_req()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = router.clone().oneshot(delete_req()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_webhook_test_returns_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(&dir);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/notifications/webhooks/no-such-id/test",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_exposition_includes_fixed_names() {
    let dir = tempfile::tempdir().unwrap();
    let router = test_router(&dir);

    // one request first so the HTTP counters exist
    let _ = router.clone().oneshot(get("/healthz")).await.unwrap();

    let response = router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("velero_dashboard_clusters_connected"));
    assert!(text.contains("velero_dashboard_websocket_clients"));
    assert!(text.contains("velero_dashboard_http_requests_total"));
}
