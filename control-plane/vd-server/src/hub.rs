//! In-process fan-out of watcher events to connected WebSocket clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error};

use vd_models::WsEvent;

use crate::metrics;

/// Per-client channel capacity. A consumer whose channel fills up is treated
/// as a failed write and evicted, not buffered further.
const CLIENT_BUFFER: usize = 32;

pub struct Hub {
    clients: Arc<RwLock<HashMap<u64, mpsc::Sender<String>>>>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new() -> Arc<Self> {
        Arc::new(Hub {
            clients: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        })
    }

    /// Adds a client and returns its id plus the receiving end the
    /// connection's writer task drains.
    pub async fn register(&self) -> (u64, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);

        let mut clients = self.clients.write().await;
        clients.insert(id, tx);
        metrics::WEBSOCKET_CLIENTS.set(clients.len() as f64);
        debug!(total = clients.len(), "WebSocket client connected");
        (id, rx)
    }

    pub async fn unregister(&self, id: u64) {
        let mut clients = self.clients.write().await;
        clients.remove(&id);
        metrics::WEBSOCKET_CLIENTS.set(clients.len() as f64);
        debug!(total = clients.len(), "WebSocket client disconnected");
    }

    /// Sends an event to every connected client. The event is serialised
    /// once; a client that cannot accept the write (dead or stalled) is
    /// scheduled for eviction on a separate task so the broadcast loop never
    /// blocks.
    pub async fn broadcast(&self, event: &WsEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                error!(error = %err, "Failed to marshal WebSocket event");
                return;
            }
        };

        let clients = self.clients.read().await;
        for (id, tx) in clients.iter() {
            if tx.try_send(payload.clone()).is_err() {
                debug!(client = id, "Failed to write to WebSocket client, evicting");
                let clients = Arc::clone(&self.clients);
                let id = *id;
                tokio::spawn(async move {
                    let mut clients = clients.write().await;
                    clients.remove(&id);
                    metrics::WEBSOCKET_CLIENTS.set(clients.len() as f64);
                });
            }
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vd_models::{ResourceKind, WatchAction};

    fn event(name: &str) -> WsEvent {
        WsEvent {
            kind: ResourceKind::Backup,
            action: WatchAction::Added,
            resource: serde_json::json!({ "name": name }),
            cluster_id: "c1".into(),
        }
    }

    #[tokio::test]
    async fn broadcast_preserves_order_per_client() {
        let hub = Hub::new();
        let (_id, mut rx) = hub.register().await;

        hub.broadcast(&event("first")).await;
        hub.broadcast(&event("second")).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.contains("first"));
        assert!(second.contains("second"));
    }

    #[tokio::test]
    async fn dead_client_is_evicted_and_others_still_receive() {
        let hub = Hub::new();
        let (_dead_id, dead_rx) = hub.register().await;
        let (_live_id, mut live_rx) = hub.register().await;
        assert_eq!(hub.client_count().await, 2);

        drop(dead_rx);
        hub.broadcast(&event("e1")).await;

        assert!(live_rx.recv().await.unwrap().contains("e1"));

        // eviction runs on a separate task
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(hub.client_count().await, 1);
    }

    #[tokio::test]
    async fn stalled_client_is_evicted_once_its_buffer_fills() {
        let hub = Hub::new();
        let (_stalled, _rx_kept_but_not_drained) = hub.register().await;

        for i in 0..(CLIENT_BUFFER + 1) {
            hub.broadcast(&event(&format!("e{i}"))).await;
        }

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(hub.client_count().await, 0);
    }
}
