//! Notification dispatch: failure-rule evaluation, webhook fan-out and the
//! per-type payload formatting.

mod discord;
mod generic;
mod slack;
mod teams;

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info};

use vd_models::{EventType, NotificationEvent, ResourceKind, WebhookConfig, WebhookType};
use vd_store::{StoreError, WebhookStore};

use crate::metrics;

const DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Seam between the resource watchers and the dispatcher.
pub trait EventNotifier: Send + Sync {
    fn dispatch(&self, event: NotificationEvent);
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook returned status {0}")]
    Status(u16),
}

/// Maps a watched `(kind, terminal phase)` pair to the notification event it
/// produces, if any.
pub fn failure_event(
    kind: ResourceKind,
    phase: &str,
    name: &str,
) -> Option<(EventType, String, String)> {
    match kind {
        ResourceKind::Backup => match phase {
            "Failed" => Some((
                EventType::BackupFailed,
                "Backup Failed".to_string(),
                format!("Backup \"{name}\" failed"),
            )),
            "PartiallyFailed" => Some((
                EventType::BackupPartiallyFailed,
                "Backup Partially Failed".to_string(),
                format!("Backup \"{name}\" completed with errors"),
            )),
            _ => None,
        },
        ResourceKind::Restore => match phase {
            "Failed" | "PartiallyFailed" => Some((
                EventType::RestoreFailed,
                "Restore Failed".to_string(),
                format!("Restore \"{name}\" failed"),
            )),
            _ => None,
        },
        ResourceKind::Bsl => match phase {
            "Unavailable" => Some((
                EventType::BslUnavailable,
                "Backup Storage Location Unavailable".to_string(),
                format!("BSL \"{name}\" is unavailable"),
            )),
            _ => None,
        },
        ResourceKind::Schedule => None,
    }
}

/// Dispatches notification events to the configured webhooks.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn WebhookStore>,
    http: reqwest::Client,
}

impl Notifier {
    pub fn new(store: Arc<dyn WebhookStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Notifier { store, http }
    }

    pub fn store(&self) -> &Arc<dyn WebhookStore> {
        &self.store
    }

    /// Fans the event out to every enabled webhook subscribed to its type.
    /// Deliveries run as independent tasks: one slow endpoint never delays
    /// the others.
    pub async fn dispatch_event(&self, event: NotificationEvent) {
        let webhooks = match self.store.list().await {
            Ok(webhooks) => webhooks,
            Err(err) => {
                error!(error = %err, "Failed to list webhooks for dispatch");
                return;
            }
        };

        for webhook in webhooks {
            if !webhook.enabled || !webhook.events.contains(&event.event_type) {
                continue;
            }
            let notifier = self.clone();
            let event = event.clone();
            tokio::spawn(async move {
                notifier.deliver(webhook, event).await;
            });
        }
    }

    async fn deliver(&self, webhook: WebhookConfig, event: NotificationEvent) {
        let started = Instant::now();
        let result = self
            .send(webhook.webhook_type, &webhook.url, &event)
            .await;
        let duration = started.elapsed().as_secs_f64();

        metrics::WEBHOOK_DELIVERY_DURATION
            .with_label_values(&[webhook.webhook_type.as_str()])
            .observe(duration);

        let (status, error_message) = match &result {
            Ok(()) => {
                info!(
                    webhook = %webhook.name,
                    event = %event.event_type,
                    "Webhook delivered"
                );
                ("success", String::new())
            }
            Err(err) => {
                error!(
                    webhook = %webhook.name,
                    kind = webhook.webhook_type.as_str(),
                    event = %event.event_type,
                    error = %err,
                    "Webhook delivery failed"
                );
                ("error", err.to_string())
            }
        };

        metrics::WEBHOOK_DELIVERIES_TOTAL
            .with_label_values(&[webhook.webhook_type.as_str(), status])
            .inc();
        let _ = self
            .store
            .update_delivery_status(&webhook.id, status, &error_message)
            .await;
    }

    /// Delivers the fixed test payload to one webhook, bypassing rule
    /// evaluation.
    pub async fn send_test(&self, webhook_id: &str) -> Result<(), NotifyError> {
        let webhook = self.store.get(webhook_id).await?;
        self.send(webhook.webhook_type, &webhook.url, &NotificationEvent::test())
            .await
    }

    async fn send(
        &self,
        webhook_type: WebhookType,
        url: &str,
        event: &NotificationEvent,
    ) -> Result<(), NotifyError> {
        let payload = match webhook_type {
            WebhookType::Slack => slack::payload(event),
            WebhookType::Teams => teams::payload(event),
            WebhookType::Discord => discord::payload(event),
            WebhookType::Generic => generic::payload(event),
        };

        let response = self.http.post(url).json(&payload).send().await?;
        if response.status().is_client_error() || response.status().is_server_error() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

impl EventNotifier for Notifier {
    fn dispatch(&self, event: NotificationEvent) {
        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.dispatch_event(event).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_table_matches_spec() {
        assert_eq!(
            failure_event(ResourceKind::Backup, "Failed", "b").map(|(t, _, _)| t),
            Some(EventType::BackupFailed)
        );
        assert_eq!(
            failure_event(ResourceKind::Backup, "PartiallyFailed", "b").map(|(t, _, _)| t),
            Some(EventType::BackupPartiallyFailed)
        );
        assert_eq!(
            failure_event(ResourceKind::Restore, "Failed", "r").map(|(t, _, _)| t),
            Some(EventType::RestoreFailed)
        );
        assert_eq!(
            failure_event(ResourceKind::Restore, "PartiallyFailed", "r").map(|(t, _, _)| t),
            Some(EventType::RestoreFailed)
        );
        assert_eq!(
            failure_event(ResourceKind::Bsl, "Unavailable", "bsl").map(|(t, _, _)| t),
            Some(EventType::BslUnavailable)
        );
    }

    #[test]
    fn non_terminal_phases_produce_no_event() {
        assert!(failure_event(ResourceKind::Backup, "Completed", "b").is_none());
        assert!(failure_event(ResourceKind::Backup, "InProgress", "b").is_none());
        assert!(failure_event(ResourceKind::Restore, "Completed", "r").is_none());
        assert!(failure_event(ResourceKind::Bsl, "Available", "bsl").is_none());
        assert!(failure_event(ResourceKind::Schedule, "Failed", "s").is_none());
    }

    #[test]
    fn messages_quote_the_resource_name() {
        let (_, title, message) = failure_event(ResourceKind::Backup, "Failed", "nightly").unwrap();
        assert_eq!(title, "Backup Failed");
        assert_eq!(message, "Backup \"nightly\" failed");
    }
}
