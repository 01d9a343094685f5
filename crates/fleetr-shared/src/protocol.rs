//! WebSocket message vocabulary between the hub and its agents.
//!
//! Every frame is a JSON envelope: `{"event": "heartbeat", "data": {...}}`.
//! Inbound payloads apply defaults instead of rejecting partial messages —
//! an agent that omits a field must never break the handling loop.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WsMessage {
    /// Event name, e.g. `register`, `command`, `device_connected`.
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl WsMessage {
    pub fn event(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

// --- Inbound payloads (agent → hub) ---

/// `register` — fills in a session's identity fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub info: Map<String, Value>,
}

/// `heartbeat` — refreshes liveness and telemetry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    #[serde(default)]
    pub battery: Option<f64>,
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default)]
    pub info: Map<String, Value>,
}

/// `command_result` — an asynchronous result echoing the command id back.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResultPayload {
    #[serde(default)]
    pub command_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

/// `data` — opaque passthrough, fanned out verbatim as `new_data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataPayload {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

// --- Outbound builders (hub → agent) ---

pub fn welcome(device_id: &str, server_time: i64) -> WsMessage {
    WsMessage::event(
        "welcome",
        json!({ "deviceId": device_id, "serverTime": server_time }),
    )
}

pub fn registered(device_id: &str) -> WsMessage {
    WsMessage::event("registered", json!({ "success": true, "deviceId": device_id }))
}

pub fn command(command_id: &str, action: &str, payload: &Value, issued_at: i64) -> WsMessage {
    WsMessage::event(
        "command",
        json!({
            "commandId": command_id,
            "action": action,
            "payload": payload,
            "issuedAt": issued_at,
        }),
    )
}

pub fn heartbeat_ack(timestamp: i64) -> WsMessage {
    WsMessage::event("heartbeat_ack", json!({ "timestamp": timestamp }))
}

pub fn ping(timestamp: i64) -> WsMessage {
    WsMessage::event("ping", json!({ "timestamp": timestamp }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrip() {
        let msg = WsMessage::event("heartbeat", json!({"battery": 80}));
        let text = serde_json::to_string(&msg).unwrap();
        let back: WsMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn register_payload_defaults_missing_fields() {
        let payload: RegisterPayload = serde_json::from_value(json!({})).unwrap();
        assert!(payload.device_name.is_none());
        assert!(payload.os.is_none());
        assert!(payload.info.is_empty());
    }

    #[test]
    fn command_result_defaults_to_empty_correlation_id() {
        // A result without a commandId must parse; correlation drops it later.
        let payload: CommandResultPayload =
            serde_json::from_value(json!({"status": "done"})).unwrap();
        assert_eq!(payload.command_id, "");
        assert_eq!(payload.status.as_deref(), Some("done"));
    }

    #[test]
    fn data_payload_keeps_wire_field_names() {
        let payload: DataPayload =
            serde_json::from_value(json!({"type": "screenshot", "data": {"w": 1}})).unwrap();
        assert_eq!(payload.kind.as_deref(), Some("screenshot"));
    }

    #[test]
    fn command_message_shape() {
        let msg = command("cmd-1", "ping", &json!({}), 42);
        assert_eq!(msg.event, "command");
        assert_eq!(msg.data["commandId"], "cmd-1");
        assert_eq!(msg.data["issuedAt"], 42);
    }
}
