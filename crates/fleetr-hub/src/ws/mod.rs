pub mod connection_manager;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc::unbounded_channel;
use tracing::debug;
use uuid::Uuid;

use crate::sync::HubEngine;
use connection_manager::{WsConnection, WsOutMessage};

/// Shared state for the WebSocket handlers.
#[derive(Clone)]
pub struct WsState {
    pub engine: Arc<HubEngine>,
}

pub fn ws_router(state: WsState) -> Router {
    Router::new()
        .route("/ws", axum::routing::get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(
    State(state): State<WsState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state, addr))
}

async fn handle_ws(socket: WebSocket, state: WsState, addr: SocketAddr) {
    let conn_id = Uuid::new_v4().to_string();
    let remote_addr = addr.to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = unbounded_channel::<WsOutMessage>();

    state
        .engine
        .connections()
        .add_connection(WsConnection {
            id: conn_id.clone(),
            remote_addr: remote_addr.clone(),
            tx: out_tx,
        })
        .await;

    // Session allocated up front; identity arrives later via `register`.
    let session_id = state.engine.handle_connect(&conn_id, &remote_addr).await;

    // Outgoing message pump
    let conn_id_out = conn_id.clone();
    let out_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let result = match msg {
                WsOutMessage::Text(text) => ws_tx.send(Message::Text(text.into())).await,
                WsOutMessage::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break; // Drop ws_tx to force-close the connection
                }
            };
            if let Err(e) = result {
                debug!(conn_id = %conn_id_out, error = %e, "WebSocket send failed, closing outgoing pump");
                break;
            }
        }
    });

    // Incoming message processing. A malformed or unexpected frame must
    // never take down the loop for other sessions: bad input is skipped.
    let mut disconnect_reason = "transport close";
    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(_) => {
                disconnect_reason = "transport error";
                break;
            }
        };

        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Close(_) => {
                disconnect_reason = "client disconnect";
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            _ => continue,
        };

        let parsed: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(_) => continue,
        };
        let event = match parsed.get("event").and_then(|v| v.as_str()) {
            Some(e) => e.to_string(),
            None => continue,
        };
        let data = parsed.get("data").cloned().unwrap_or(Value::Null);

        dispatch_event(&state.engine, &session_id, &event, data).await;
    }

    state.engine.handle_disconnect(&session_id, disconnect_reason).await;
    state.engine.connections().remove_connection(&conn_id).await;
    out_task.abort();
}

/// Message-dispatch loop keyed by event kind; each branch completes
/// synchronously against the engine, so per-session arrival order is
/// processing order.
async fn dispatch_event(engine: &Arc<HubEngine>, session_id: &str, event: &str, data: Value) {
    match event {
        "register" => {
            let payload = serde_json::from_value(data).unwrap_or_default();
            engine.handle_register(session_id, payload).await;
        }
        "heartbeat" => {
            let payload = serde_json::from_value(data).unwrap_or_default();
            engine.handle_heartbeat(session_id, payload).await;
        }
        "command_result" => {
            let payload = serde_json::from_value(data).unwrap_or_default();
            engine.handle_command_result(session_id, payload).await;
        }
        "data" => {
            let payload = serde_json::from_value(data).unwrap_or_default();
            engine.handle_data(session_id, payload).await;
        }
        other => {
            debug!(session_id = %session_id, event = %other, "ignoring unknown event");
        }
    }
}
