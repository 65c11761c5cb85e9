use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection state of a registered cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    Pending,
    Connected,
    Error,
}

impl std::fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterStatus::Pending => write!(f, "pending"),
            ClusterStatus::Connected => write!(f, "connected"),
            ClusterStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for ClusterStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ClusterStatus::Pending),
            "connected" => Ok(ClusterStatus::Connected),
            "error" => Ok(ClusterStatus::Error),
            other => Err(format!("unknown cluster status: {other}")),
        }
    }
}

/// A registered target cluster, including its credential blob.
/// The blob never leaves the process in API responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    pub id: String,
    pub name: String,
    #[serde(skip)]
    pub credential_blob: Vec<u8>,
    pub namespace: String,
    pub status: ClusterStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status_message: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub last_health_check: Option<DateTime<Utc>>,
}

/// API projection of a cluster record, without the credential blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub status: ClusterStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_message: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl ClusterRecord {
    pub fn to_summary(&self) -> ClusterSummary {
        ClusterSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            status: self.status,
            status_message: self.status_message.clone(),
            is_default: self.is_default,
            created_at: self.created_at,
            last_health_check: self.last_health_check,
        }
    }
}

/// Payload for registering a cluster. Accepts either a raw kubeconfig or
/// token-based parameters that are synthesised into one server-side.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterRequest {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub set_as_default: bool,

    #[serde(default)]
    pub kubeconfig: String,

    #[serde(default)]
    pub api_server: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub ca_cert: String,
    #[serde(default)]
    pub insecure_skip_tls: bool,
}

/// Partial update of a cluster record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClusterRequest {
    pub name: Option<String>,
    pub kubeconfig: Option<String>,
    pub namespace: Option<String>,
    pub set_as_default: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_omits_credential_blob() {
        let record = ClusterRecord {
            id: "c1".into(),
            name: "prod".into(),
            credential_blob: b"secret".to_vec(),
            namespace: "velero".into(),
            status: ClusterStatus::Connected,
            status_message: String::new(),
            is_default: true,
            created_at: Utc::now(),
            last_health_check: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("credentialBlob").is_none());
        assert!(json.get("credential_blob").is_none());
        assert_eq!(json["status"], "connected");
        assert_eq!(json["isDefault"], true);
        // empty status message is omitted
        assert!(json.get("statusMessage").is_none());
    }

    #[test]
    fn create_request_accepts_both_auth_modes() {
        let kubeconfig: CreateClusterRequest = serde_json::from_str(
            r#"{"name":"a","namespace":"velero","kubeconfig":"apiVersion: v1"}"#,
        )
        .unwrap();
        assert!(!kubeconfig.kubeconfig.is_empty());
        assert!(kubeconfig.api_server.is_empty());

        let token: CreateClusterRequest = serde_json::from_str(
            r#"{"name":"b","apiServer":"https://k8s:6443","token":"t","insecureSkipTLS":true}"#,
        )
        .unwrap();
        assert_eq!(token.api_server, "https://k8s:6443");
        assert!(token.insecure_skip_tls);
    }
}
