use anyhow::Result;
use envconfig::Envconfig;
use std::time::Duration;
use vd_store::{StoreConfig, StoreError};

#[derive(Debug, Clone, Envconfig)]
pub struct AppConfig {
    // Server configuration
    #[envconfig(from = "SERVER_HOST", default = "0.0.0.0")]
    pub server_host: String,

    #[envconfig(from = "SERVER_PORT", default = "8080")]
    pub server_port: u16,

    #[envconfig(
        from = "SERVER_ALLOWED_ORIGINS",
        default = "http://localhost:3000,http://localhost:3001"
    )]
    pub server_allowed_origins: String,

    // Velero / legacy single-cluster configuration
    #[envconfig(from = "VELERO_NAMESPACE", default = "velero")]
    pub velero_namespace: String,

    #[envconfig(from = "KUBECONFIG", default = "")]
    pub kubeconfig: String,

    // Cluster store configuration
    #[envconfig(from = "CLUSTER_STORAGE_TYPE", default = "auto")]
    pub cluster_storage_type: String,

    #[envconfig(from = "CLUSTER_DB_PATH", default = "")]
    pub cluster_db_path: String,

    #[envconfig(from = "CLUSTER_ENCRYPTION_KEY")]
    pub cluster_encryption_key: Option<String>,

    #[envconfig(from = "CLUSTER_CONFIGMAP_NAME", default = "")]
    pub cluster_configmap_name: String,

    // Auth configuration
    #[envconfig(from = "AUTH_MODE", default = "none")]
    pub auth_mode: String,

    #[envconfig(from = "AUTH_USERS", default = "")]
    pub auth_users: String,

    #[envconfig(from = "JWT_SECRET", default = "")]
    pub jwt_secret: String,

    #[envconfig(from = "JWT_EXPIRATION", default = "24h")]
    pub jwt_expiration: String,

    #[envconfig(from = "OIDC_ISSUER", default = "")]
    pub oidc_issuer: String,

    #[envconfig(from = "OIDC_CLIENT_ID", default = "")]
    pub oidc_client_id: String,

    #[envconfig(from = "OIDC_CLIENT_SECRET", default = "")]
    pub oidc_client_secret: String,

    #[envconfig(from = "OIDC_REDIRECT_URL", default = "")]
    pub oidc_redirect_url: String,

    #[envconfig(from = "OIDC_ROLE_CLAIM", default = "groups")]
    pub oidc_role_claim: String,

    #[envconfig(from = "OIDC_ADMIN_GROUPS", default = "velero-admins")]
    pub oidc_admin_groups: String,

    #[envconfig(from = "OIDC_OPERATOR_GROUPS", default = "velero-operators")]
    pub oidc_operator_groups: String,

    #[envconfig(from = "OIDC_DEFAULT_ROLE", default = "viewer")]
    pub oidc_default_role: String,

    #[envconfig(from = "FRONTEND_URL", default = "http://localhost:3001")]
    pub frontend_url: String,
}

impl AppConfig {
    /// Load configuration from environment variables only.
    pub fn load_from_env() -> Result<Self> {
        Ok(Self::init_from_env()?)
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            host: self.server_host.clone(),
            port: self.server_port,
            allowed_origins: split_trim(&self.server_allowed_origins),
        }
    }

    pub fn store(&self) -> Result<StoreConfig, StoreError> {
        Ok(StoreConfig {
            storage_type: self.cluster_storage_type.parse()?,
            db_path: self.cluster_db_path.clone(),
            encryption_key: self.cluster_encryption_key.clone(),
            namespace: self.velero_namespace.clone(),
            configmap_name: self.cluster_configmap_name.clone(),
        })
    }

    pub fn auth(&self) -> AuthConfig {
        AuthConfig {
            mode: match self.auth_mode.as_str() {
                "basic" => AuthMode::Basic,
                "oidc" => AuthMode::Oidc,
                _ => AuthMode::None,
            },
            jwt_secret: self.jwt_secret.clone(),
            jwt_expiration: parse_duration(&self.jwt_expiration)
                .unwrap_or(Duration::from_secs(24 * 3600)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    None,
    Basic,
    Oidc,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::None => "none",
            AuthMode::Basic => "basic",
            AuthMode::Oidc => "oidc",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub jwt_secret: String,
    pub jwt_expiration: Duration,
}

pub fn split_trim(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Parses Go-style duration strings of the form `<n>h`, `<n>m`, `<n>s`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(hours) = s.strip_suffix('h') {
        return hours.parse::<u64>().ok().map(|h| Duration::from_secs(h * 3600));
    }
    if let Some(minutes) = s.strip_suffix('m') {
        return minutes.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60));
    }
    if let Some(seconds) = s.strip_suffix('s') {
        return seconds.parse::<u64>().ok().map(Duration::from_secs);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_go_style_suffixes() {
        assert_eq!(parse_duration("24h"), Some(Duration::from_secs(86400)));
        assert_eq!(parse_duration("30m"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_duration("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("bogus"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn split_trim_drops_empty_entries() {
        assert_eq!(
            split_trim("http://a, http://b,, "),
            vec!["http://a".to_string(), "http://b".to_string()]
        );
    }
}
