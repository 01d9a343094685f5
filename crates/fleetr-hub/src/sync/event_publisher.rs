use std::sync::Arc;

use fleetr_shared::schemas::BroadcastEvent;
use tokio::sync::broadcast;

use crate::ws::connection_manager::ConnectionManager;

/// Publishes domain events to every connected channel and to in-process
/// observers. Fan-out is synchronous with the triggering event — no queuing
/// or batching — and best-effort per recipient.
pub struct EventPublisher {
    conn_mgr: Arc<ConnectionManager>,
    tx: broadcast::Sender<BroadcastEvent>,
}

impl EventPublisher {
    pub fn new(conn_mgr: Arc<ConnectionManager>) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { conn_mgr, tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }

    pub async fn emit(&self, event: BroadcastEvent) {
        match serde_json::to_string(&event) {
            Ok(text) => self.conn_mgr.broadcast_all(&text).await,
            Err(e) => tracing::warn!(error = %e, "failed to serialize broadcast event"),
        }
        // Observers may come and go; a send with no receivers is fine.
        let _ = self.tx.send(event);
    }
}
