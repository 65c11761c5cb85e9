use serde_json::{Value, json};
use vd_models::NotificationEvent;

/// Plain JSON payload for generic webhook consumers.
pub fn payload(event: &NotificationEvent) -> Value {
    let mut payload = json!({
        "event": event.event_type.as_str(),
        "title": event.title,
        "message": event.message,
        "timestamp": event.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    });

    if !event.cluster_id.is_empty() {
        payload["clusterId"] = json!(event.cluster_id);
    }
    if !event.cluster_name.is_empty() {
        payload["clusterName"] = json!(event.cluster_name);
    }
    if let Some(resource) = &event.resource {
        payload["resource"] = resource.clone();
    }

    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vd_models::EventType;

    #[test]
    fn test_event_omits_cluster_fields() {
        let payload = payload(&NotificationEvent::test());
        assert_eq!(payload["event"], "test");
        assert_eq!(payload["title"], "Test Notification");
        assert!(payload.get("clusterId").is_none());
        assert!(payload.get("clusterName").is_none());
        assert!(payload.get("resource").is_none());
    }

    #[test]
    fn failure_event_carries_cluster_and_resource() {
        let event = NotificationEvent {
            event_type: EventType::BackupFailed,
            title: "Backup Failed".into(),
            message: "Backup \"b\" failed".into(),
            cluster_id: "c1".into(),
            cluster_name: "prod".into(),
            resource: Some(json!({ "name": "b", "phase": "Failed" })),
            timestamp: Utc::now(),
        };

        let payload = payload(&event);
        assert_eq!(payload["event"], "backup_failed");
        assert_eq!(payload["clusterId"], "c1");
        assert_eq!(payload["resource"]["phase"], "Failed");
    }
}
