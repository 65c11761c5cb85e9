use serde_json::{Value, json};
use vd_models::{EventType, NotificationEvent};

/// Microsoft Teams adaptive-card payload.
pub fn payload(event: &NotificationEvent) -> Value {
    let footer = if event.cluster_name.is_empty() {
        "Velero Dashboard".to_string()
    } else {
        format!("Cluster: {}", event.cluster_name)
    };

    json!({
        "type": "message",
        "attachments": [{
            "contentType": "application/vnd.microsoft.card.adaptive",
            "content": {
                "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
                "type": "AdaptiveCard",
                "version": "1.4",
                "body": [
                    {
                        "type": "TextBlock",
                        "text": event.title,
                        "size": "Large",
                        "weight": "Bolder",
                        "color": color(event.event_type),
                    },
                    {
                        "type": "TextBlock",
                        "text": event.message,
                        "wrap": true,
                    },
                    {
                        "type": "TextBlock",
                        "text": format!(
                            "{} — {}",
                            footer,
                            event.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
                        ),
                        "size": "Small",
                        "color": "Light",
                    }
                ]
            }
        }]
    })
}

fn color(event_type: EventType) -> &'static str {
    match event_type {
        EventType::BackupFailed | EventType::RestoreFailed => "Attention",
        EventType::BackupPartiallyFailed | EventType::BslUnavailable => "Warning",
        EventType::Test => "Good",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn builds_adaptive_card_with_severity_color() {
        let event = NotificationEvent {
            event_type: EventType::RestoreFailed,
            title: "Restore Failed".into(),
            message: "Restore \"r1\" failed".into(),
            cluster_id: "c1".into(),
            cluster_name: "staging".into(),
            resource: None,
            timestamp: Utc::now(),
        };

        let payload = payload(&event);
        assert_eq!(payload["type"], "message");
        let card = &payload["attachments"][0]["content"];
        assert_eq!(card["type"], "AdaptiveCard");
        assert_eq!(card["body"][0]["color"], "Attention");
        assert_eq!(card["body"][1]["text"], "Restore \"r1\" failed");
        assert!(
            card["body"][2]["text"]
                .as_str()
                .unwrap()
                .starts_with("Cluster: staging")
        );
    }
}
