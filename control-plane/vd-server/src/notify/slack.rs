use serde_json::{Value, json};
use vd_models::{EventType, NotificationEvent};

/// Slack webhook payload: a top-level text plus one colored attachment.
pub fn payload(event: &NotificationEvent) -> Value {
    let footer = if event.cluster_name.is_empty() {
        "Velero Dashboard".to_string()
    } else {
        format!("Velero Dashboard — {}", event.cluster_name)
    };

    json!({
        "text": event.title,
        "attachments": [{
            "color": color(event.event_type),
            "title": event.title,
            "text": event.message,
            "footer": footer,
            "ts": event.timestamp.timestamp(),
        }]
    })
}

fn color(event_type: EventType) -> &'static str {
    match event_type {
        EventType::BackupFailed | EventType::RestoreFailed => "danger",
        EventType::BackupPartiallyFailed | EventType::BslUnavailable => "warning",
        EventType::Test => "good",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(event_type: EventType) -> NotificationEvent {
        NotificationEvent {
            event_type,
            title: "Backup Failed".into(),
            message: "Backup \"nightly\" failed".into(),
            cluster_id: "c1".into(),
            cluster_name: "prod".into(),
            resource: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn failed_events_use_danger_color() {
        let payload = payload(&event(EventType::BackupFailed));
        assert_eq!(payload["attachments"][0]["color"], "danger");
        assert_eq!(payload["attachments"][0]["title"], "Backup Failed");
        assert_eq!(payload["text"], "Backup Failed");
    }

    #[test]
    fn partial_failures_use_warning_color() {
        let payload = payload(&event(EventType::BackupPartiallyFailed));
        assert_eq!(payload["attachments"][0]["color"], "warning");
    }

    #[test]
    fn footer_includes_cluster_name() {
        let payload = payload(&event(EventType::BackupFailed));
        assert_eq!(
            payload["attachments"][0]["footer"],
            "Velero Dashboard — prod"
        );
    }
}
