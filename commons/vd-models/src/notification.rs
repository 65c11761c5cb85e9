use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported webhook payload formats. The generic sender keeps its historical
/// wire value `"webhook"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookType {
    #[serde(rename = "slack")]
    Slack,
    #[serde(rename = "teams")]
    Teams,
    #[serde(rename = "discord")]
    Discord,
    #[serde(rename = "webhook")]
    Generic,
}

impl WebhookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookType::Slack => "slack",
            WebhookType::Teams => "teams",
            WebhookType::Discord => "discord",
            WebhookType::Generic => "webhook",
        }
    }
}

impl std::fmt::Display for WebhookType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event types a webhook can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "backup_failed")]
    BackupFailed,
    #[serde(rename = "backup_partially_failed")]
    BackupPartiallyFailed,
    #[serde(rename = "restore_failed")]
    RestoreFailed,
    #[serde(rename = "bsl_unavailable")]
    BslUnavailable,
    #[serde(rename = "test")]
    Test,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::BackupFailed => "backup_failed",
            EventType::BackupPartiallyFailed => "backup_partially_failed",
            EventType::RestoreFailed => "restore_failed",
            EventType::BslUnavailable => "bsl_unavailable",
            EventType::Test => "test",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored webhook endpoint configuration, including delivery tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub webhook_type: WebhookType,
    pub url: String,
    pub events: Vec<EventType>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sent_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_error: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhookRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub webhook_type: WebhookType,
    pub url: String,
    #[serde(default)]
    pub events: Vec<EventType>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWebhookRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub webhook_type: Option<WebhookType>,
    pub url: Option<String>,
    pub events: Option<Vec<EventType>>,
    pub enabled: Option<bool>,
}

/// The typed event handed to webhook senders.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    #[serde(rename = "event")]
    pub event_type: EventType,
    pub title: String,
    pub message: String,
    #[serde(rename = "clusterId")]
    pub cluster_id: String,
    #[serde(rename = "clusterName")]
    pub cluster_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    /// The fixed payload used by webhook test deliveries.
    pub fn test() -> Self {
        NotificationEvent {
            event_type: EventType::Test,
            title: "Test Notification".to_string(),
            message: "This is a test notification from Velero Dashboard".to_string(),
            cluster_id: String::new(),
            cluster_name: String::new(),
            resource: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_type_serializes_as_webhook() {
        assert_eq!(
            serde_json::to_string(&WebhookType::Generic).unwrap(),
            r#""webhook""#
        );
        let parsed: WebhookType = serde_json::from_str(r#""webhook""#).unwrap();
        assert_eq!(parsed, WebhookType::Generic);
    }

    #[test]
    fn event_types_use_snake_case_tags() {
        assert_eq!(
            serde_json::to_string(&EventType::BackupPartiallyFailed).unwrap(),
            r#""backup_partially_failed""#
        );
    }

    #[test]
    fn webhook_config_omits_empty_delivery_fields() {
        let config = WebhookConfig {
            id: "w1".into(),
            name: "ops".into(),
            webhook_type: WebhookType::Slack,
            url: "https://hooks.example/w".into(),
            events: vec![EventType::BackupFailed],
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_sent_at: None,
            last_status: String::new(),
            last_error: String::new(),
        };

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["type"], "slack");
        assert!(json.get("lastSentAt").is_none());
        assert!(json.get("lastStatus").is_none());
        assert!(json.get("lastError").is_none());
    }
}
