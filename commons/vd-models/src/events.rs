use serde::{Deserialize, Serialize};

/// Tracked Velero resource kinds, as tagged on outbound events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Backup,
    Restore,
    Schedule,
    Bsl,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Backup,
        ResourceKind::Restore,
        ResourceKind::Schedule,
        ResourceKind::Bsl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Backup => "backup",
            ResourceKind::Restore => "restore",
            ResourceKind::Schedule => "schedule",
            ResourceKind::Bsl => "bsl",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change actions surfaced to browser clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchAction {
    Added,
    Modified,
    Deleted,
}

impl WatchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchAction::Added => "added",
            WatchAction::Modified => "modified",
            WatchAction::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for WatchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message pushed to WebSocket clients on every observed resource change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEvent {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub action: WatchAction,
    pub resource: serde_json::Value,
    #[serde(rename = "clusterId")]
    pub cluster_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_event_wire_shape() {
        let event = WsEvent {
            kind: ResourceKind::Bsl,
            action: WatchAction::Modified,
            resource: serde_json::json!({"name": "default"}),
            cluster_id: "c1".into(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "bsl");
        assert_eq!(json["action"], "modified");
        assert_eq!(json["clusterId"], "c1");
        assert_eq!(json["resource"]["name"], "default");
    }
}
