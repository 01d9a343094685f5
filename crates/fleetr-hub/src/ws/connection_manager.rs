use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};

/// A message to be sent to a WebSocket connection.
#[derive(Debug, Clone)]
pub enum WsOutMessage {
    Text(String),
    Close,
}

/// Per-connection state. The connection owns the socket; everyone else sends
/// through the unbounded channel so no caller ever blocks on a slow peer.
pub struct WsConnection {
    pub id: String,
    pub remote_addr: String,
    pub tx: mpsc::UnboundedSender<WsOutMessage>,
}

/// Central manager for all WebSocket connections.
/// Thread-safe via RwLock for use across axum handlers.
pub struct ConnectionManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_connection(&self, conn: WsConnection) {
        self.connections.write().await.insert(conn.id.clone(), conn);
    }

    pub async fn remove_connection(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a text message to a specific connection. Returns false when the
    /// connection is gone or its pump has shut down.
    pub async fn send_to(&self, conn_id: &str, msg: &str) -> bool {
        let conns = self.connections.read().await;
        match conns.get(conn_id) {
            Some(conn) => conn.tx.send(WsOutMessage::Text(msg.to_string())).is_ok(),
            None => false,
        }
    }

    /// Fan a text message out to every connected channel. Best-effort per
    /// recipient: a dead connection never blocks delivery to the others.
    pub async fn broadcast_all(&self, msg: &str) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.tx.send(WsOutMessage::Text(msg.to_string()));
        }
    }

    /// Send Close to all connections for graceful shutdown.
    pub async fn close_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.tx.send(WsOutMessage::Close);
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
