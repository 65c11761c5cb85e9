use serde_json::{Value, json};
use vd_models::{EventType, NotificationEvent};

/// Discord webhook payload: a single embed. Discord colors are decimal.
pub fn payload(event: &NotificationEvent) -> Value {
    let footer = if event.cluster_name.is_empty() {
        "Velero Dashboard".to_string()
    } else {
        format!("Velero Dashboard — {}", event.cluster_name)
    };

    json!({
        "embeds": [{
            "title": event.title,
            "description": event.message,
            "color": color(event.event_type),
            "timestamp": event.timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            "footer": { "text": footer },
        }]
    })
}

fn color(event_type: EventType) -> u32 {
    match event_type {
        EventType::BackupFailed | EventType::RestoreFailed => 0xED4245,
        EventType::BackupPartiallyFailed => 0xFEE75C,
        EventType::BslUnavailable => 0xF0B232,
        EventType::Test => 0x57F287,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn embed_carries_decimal_color() {
        let event = NotificationEvent {
            event_type: EventType::BslUnavailable,
            title: "Backup Storage Location Unavailable".into(),
            message: "BSL \"primary\" is unavailable".into(),
            cluster_id: "c1".into(),
            cluster_name: String::new(),
            resource: None,
            timestamp: Utc::now(),
        };

        let payload = payload(&event);
        let embed = &payload["embeds"][0];
        assert_eq!(embed["color"], 0xF0B232);
        assert_eq!(embed["footer"]["text"], "Velero Dashboard");
    }
}
