use serial_test::serial;
use std::env;

use vd_server::config::{AppConfig, AuthMode};

const ALL_VARS: &[&str] = &[
    "SERVER_HOST",
    "SERVER_PORT",
    "SERVER_ALLOWED_ORIGINS",
    "VELERO_NAMESPACE",
    "KUBECONFIG",
    "CLUSTER_STORAGE_TYPE",
    "CLUSTER_DB_PATH",
    "CLUSTER_ENCRYPTION_KEY",
    "CLUSTER_CONFIGMAP_NAME",
    "AUTH_MODE",
    "JWT_SECRET",
    "JWT_EXPIRATION",
];

fn clear_env() {
    for var in ALL_VARS {
        unsafe {
            env::remove_var(var);
        }
    }
}

#[test]
#[serial]
fn default_config_values() {
    clear_env();

    let config = AppConfig::load_from_env().expect("Failed to load config with defaults");

    assert_eq!(config.server_host, "0.0.0.0");
    assert_eq!(config.server_port, 8080);
    assert_eq!(config.velero_namespace, "velero");
    assert_eq!(config.cluster_storage_type, "auto");
    assert_eq!(config.auth_mode, "none");
    assert_eq!(config.jwt_expiration, "24h");
    assert_eq!(config.oidc_role_claim, "groups");
    assert_eq!(config.oidc_admin_groups, "velero-admins");
}

#[test]
#[serial]
fn config_loading_from_env() {
    clear_env();
    unsafe {
        env::set_var("SERVER_HOST", "127.0.0.1");
        env::set_var("SERVER_PORT", "3000");
        env::set_var("CLUSTER_STORAGE_TYPE", "sqlite");
        env::set_var("CLUSTER_DB_PATH", "/tmp/clusters.db");
        env::set_var("CLUSTER_ENCRYPTION_KEY", "0123456789abcdef0123456789abcdef");
    }

    let config = AppConfig::load_from_env().expect("Failed to load config from env");

    assert_eq!(config.server_host, "127.0.0.1");
    assert_eq!(config.server_port, 3000);
    assert_eq!(config.cluster_storage_type, "sqlite");
    assert_eq!(config.cluster_db_path, "/tmp/clusters.db");
    assert_eq!(
        config.cluster_encryption_key.as_deref(),
        Some("0123456789abcdef0123456789abcdef")
    );

    let server = config.server();
    assert_eq!(server.address(), "127.0.0.1:3000");

    clear_env();
}

#[test]
#[serial]
fn store_config_rejects_unknown_storage_type() {
    clear_env();
    unsafe {
        env::set_var("CLUSTER_STORAGE_TYPE", "redis");
    }

    let config = AppConfig::load_from_env().unwrap();
    assert!(config.store().is_err());

    clear_env();
}

#[test]
#[serial]
fn auth_config_parses_mode_and_expiration() {
    clear_env();
    unsafe {
        env::set_var("AUTH_MODE", "basic");
        env::set_var("JWT_SECRET", "sekret");
        env::set_var("JWT_EXPIRATION", "2h");
    }

    let auth = AppConfig::load_from_env().unwrap().auth();
    assert_eq!(auth.mode, AuthMode::Basic);
    assert_eq!(auth.jwt_secret, "sekret");
    assert_eq!(auth.jwt_expiration.as_secs(), 2 * 3600);

    clear_env();
}

#[test]
#[serial]
fn allowed_origins_are_split_and_trimmed() {
    clear_env();
    unsafe {
        env::set_var(
            "SERVER_ALLOWED_ORIGINS",
            "http://localhost:3000, https://dashboard.example.com",
        );
    }

    let server = AppConfig::load_from_env().unwrap().server();
    assert_eq!(
        server.allowed_origins,
        vec![
            "http://localhost:3000".to_string(),
            "https://dashboard.example.com".to_string()
        ]
    );

    clear_env();
}
