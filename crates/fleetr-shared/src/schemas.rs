//! Shared data model: sessions, commands, and broadcast events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Online,
    Offline,
}

/// The hub's record of one connected agent. Allocated at connect time and
/// retained after disconnect as an offline history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Transport connection id. The transport owns the channel; this is a
    /// lookup key, cleared on disconnect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Free-form metadata, shallow-merged on every heartbeat.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub info: Map<String, Value>,
    pub remote_addr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    pub status: SessionStatus,
    pub connected_at: i64,
    pub last_seen: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnected_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnect_reason: Option<String>,
}

impl Session {
    /// Normalized summary for the device listing boundary. Identity fields
    /// an agent never registered show up as the documented defaults.
    pub fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            id: self.id.clone(),
            name: self
                .name
                .clone()
                .unwrap_or_else(|| "Unknown Device".to_string()),
            device_type: self
                .device_type
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            os: self.os.clone().unwrap_or_else(|| "unknown".to_string()),
            ip: self.remote_addr.clone(),
            status: self.status,
            connected_at: self.connected_at,
            last_seen: self.last_seen,
            battery: self.battery,
            location: self.location.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub os: String,
    pub ip: String,
    pub status: SessionStatus,
    pub connected_at: i64,
    pub last_seen: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
}

/// One operator-issued command, tracked until a result is correlated back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub command_id: String,
    /// Target session, referenced by id — the session may disconnect or be
    /// replaced while this record persists.
    pub device_id: String,
    pub action: String,
    pub payload: Value,
    /// `"sent"` until the agent reports back; then the agent's status string
    /// verbatim.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub issued_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

/// Notifications fanned out to every connected channel. Serializes to the
/// same `{event, data}` envelope the rest of the protocol uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum BroadcastEvent {
    #[serde(rename_all = "camelCase")]
    DeviceConnected {
        device_id: String,
        name: String,
        device_type: String,
        timestamp: i64,
    },
    #[serde(rename_all = "camelCase")]
    DeviceDisconnected {
        device_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        reason: String,
        timestamp: i64,
    },
    #[serde(rename_all = "camelCase")]
    CommandCompleted {
        device_id: String,
        command_id: String,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        timestamp: i64,
    },
    #[serde(rename_all = "camelCase")]
    NewData {
        device_id: String,
        #[serde(rename = "type")]
        data_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        timestamp: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn broadcast_event_wire_shape() {
        let event = BroadcastEvent::DeviceConnected {
            device_id: "d1".into(),
            name: "Pixel".into(),
            device_type: "android".into(),
            timestamp: 7,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "device_connected");
        assert_eq!(value["data"]["deviceId"], "d1");
        assert_eq!(value["data"]["deviceType"], "android");
    }

    #[test]
    fn summary_applies_identity_defaults() {
        let session = Session {
            id: "s1".into(),
            channel_id: Some("c1".into()),
            name: None,
            device_type: None,
            os: None,
            info: Map::new(),
            remote_addr: "10.0.0.9".into(),
            battery: None,
            location: None,
            status: SessionStatus::Online,
            connected_at: 1,
            last_seen: 2,
            disconnected_at: None,
            disconnect_reason: None,
        };
        let summary = session.summary();
        assert_eq!(summary.name, "Unknown Device");
        assert_eq!(summary.os, "unknown");
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["type"], "unknown");
        assert_eq!(value["status"], "online");
    }

    #[test]
    fn new_data_keeps_inner_type_field() {
        let event = BroadcastEvent::NewData {
            device_id: "d1".into(),
            data_type: "clipboard".into(),
            data: Some(json!({"text": "hi"})),
            timestamp: 3,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "new_data");
        assert_eq!(value["data"]["type"], "clipboard");
    }
}
