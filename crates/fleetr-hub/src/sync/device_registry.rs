use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use fleetr_shared::protocol::{HeartbeatPayload, RegisterPayload};
use fleetr_shared::schemas::{Session, SessionStatus};
use serde_json::{Map, Value};
use uuid::Uuid;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Identity snapshot returned by a successful registration, with defaults
/// already applied.
pub struct RegisteredIdentity {
    pub channel_id: Option<String>,
    pub name: String,
    pub device_type: String,
}

/// The authoritative table of every session the hub has seen.
///
/// Sessions are keyed by id and kept in insertion order for listing. A
/// session is never reused across reconnects: each connection allocates a
/// fresh id and the previous record stays behind as offline history.
pub struct DeviceRegistry {
    sessions: HashMap<String, Session>,
    order: Vec<String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Allocate a fresh online session for a new transport connection.
    /// No broadcast happens here; observers are notified on registration.
    pub fn on_connect(&mut self, channel_id: &str, remote_addr: &str) -> String {
        let now = now_millis();
        let id = Uuid::new_v4().to_string();
        let session = Session {
            id: id.clone(),
            channel_id: Some(channel_id.to_string()),
            name: None,
            device_type: None,
            os: None,
            info: Map::new(),
            remote_addr: remote_addr.to_string(),
            battery: None,
            location: None,
            status: SessionStatus::Online,
            connected_at: now,
            last_seen: now,
            disconnected_at: None,
            disconnect_reason: None,
        };
        self.sessions.insert(id.clone(), session);
        self.order.push(id.clone());
        id
    }

    /// Fill identity fields and refresh `last_seen`. Silently ignored for
    /// unknown ids — a registration racing a disconnect is expected.
    pub fn register(
        &mut self,
        session_id: &str,
        payload: &RegisterPayload,
    ) -> Option<RegisteredIdentity> {
        let session = self.sessions.get_mut(session_id)?;
        let name = payload
            .device_name
            .clone()
            .unwrap_or_else(|| "Unknown Device".to_string());
        let device_type = payload
            .device_type
            .clone()
            .unwrap_or_else(|| "android".to_string());
        session.name = Some(name.clone());
        session.device_type = Some(device_type.clone());
        session.os = Some(payload.os.clone().unwrap_or_else(|| "Unknown OS".to_string()));
        session.info = payload.info.clone();
        session.last_seen = now_millis();
        Some(RegisteredIdentity {
            channel_id: session.channel_id.clone(),
            name,
            device_type,
        })
    }

    /// Refresh liveness and merge telemetry. A late heartbeat flips an
    /// offline session back to online. No-op for unknown ids.
    /// Returns the session's channel id when the session is known.
    pub fn heartbeat(
        &mut self,
        session_id: &str,
        payload: &HeartbeatPayload,
    ) -> Option<Option<String>> {
        let session = self.sessions.get_mut(session_id)?;
        session.last_seen = now_millis();
        session.status = SessionStatus::Online;
        if payload.battery.is_some() {
            session.battery = payload.battery;
        }
        if payload.location.is_some() {
            session.location = payload.location.clone();
        }
        merge_info(&mut session.info, &payload.info);
        Some(session.channel_id.clone())
    }

    /// Mark a session offline and detach its channel. No-op for unknown ids.
    /// Returns the registered name (if any) for the disconnect broadcast.
    pub fn on_disconnect(&mut self, session_id: &str, reason: &str) -> Option<Option<String>> {
        let session = self.sessions.get_mut(session_id)?;
        let now = now_millis();
        session.status = SessionStatus::Offline;
        session.channel_id = None;
        session.last_seen = now;
        session.disconnected_at = Some(now);
        session.disconnect_reason = Some(reason.to_string());
        Some(session.name.clone())
    }

    /// The channel to send on, reflecting the most recent connect/disconnect.
    pub fn resolve_channel(&self, session_id: &str) -> Option<String> {
        self.sessions.get(session_id)?.channel_id.clone()
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    /// Snapshots in insertion order, oldest connection first.
    pub fn list(&self) -> Vec<Session> {
        self.order
            .iter()
            .filter_map(|id| self.sessions.get(id))
            .cloned()
            .collect()
    }

    /// Online sessions that still have a live channel, for keepalive probes.
    pub fn online_channels(&self) -> Vec<(String, String)> {
        self.order
            .iter()
            .filter_map(|id| self.sessions.get(id))
            .filter(|s| s.status == SessionStatus::Online)
            .filter_map(|s| s.channel_id.clone().map(|ch| (s.id.clone(), ch)))
            .collect()
    }

    /// Demote online sessions silent past the threshold. A logical liveness
    /// mark only: the channel reference is left alone (it may already be
    /// dead) and no disconnect timestamp is recorded.
    pub fn mark_stale(&mut self, now: i64, threshold_ms: i64) -> Vec<String> {
        let mut demoted = Vec::new();
        for session in self.sessions.values_mut() {
            if session.status == SessionStatus::Online && now - session.last_seen > threshold_ms {
                session.status = SessionStatus::Offline;
                demoted.push(session.id.clone());
            }
        }
        demoted
    }

    /// Drop offline records older than the retention window.
    pub fn prune_offline(&mut self, now: i64, retention_ms: i64) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| {
            s.status == SessionStatus::Online || now - s.last_seen <= retention_ms
        });
        self.order.retain(|id| self.sessions.contains_key(id));
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn online_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.status == SessionStatus::Online)
            .count()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shallow merge: new keys added, existing keys overwritten, untouched keys
/// preserved.
fn merge_info(existing: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (key, value) in incoming {
        existing.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn connect_allocates_fresh_online_session() {
        let mut registry = DeviceRegistry::new();
        let id = registry.on_connect("ch-1", "10.0.0.5");
        let session = registry.get(&id).unwrap();
        assert_eq!(session.status, SessionStatus::Online);
        assert!(session.name.is_none());
        assert_eq!(registry.resolve_channel(&id).as_deref(), Some("ch-1"));
    }

    #[test]
    fn register_applies_defaults_for_missing_fields() {
        let mut registry = DeviceRegistry::new();
        let id = registry.on_connect("ch-1", "10.0.0.5");
        let applied = registry.register(&id, &RegisterPayload::default()).unwrap();
        assert_eq!(applied.name, "Unknown Device");
        assert_eq!(applied.device_type, "android");
        assert_eq!(registry.get(&id).unwrap().os.as_deref(), Some("Unknown OS"));
    }

    #[test]
    fn register_unknown_id_is_a_silent_noop() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.register("nope", &RegisterPayload::default()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn heartbeat_shallow_merges_telemetry_info() {
        let mut registry = DeviceRegistry::new();
        let id = registry.on_connect("ch-1", "10.0.0.5");
        registry.heartbeat(
            &id,
            &HeartbeatPayload {
                battery: Some(80.0),
                location: None,
                info: info(&[("carrier", json!("att")), ("rooted", json!(false))]),
            },
        );
        registry.heartbeat(
            &id,
            &HeartbeatPayload {
                battery: Some(75.0),
                location: Some(json!({"lat": 1.0})),
                info: info(&[("rooted", json!(true)), ("sim", json!("a"))]),
            },
        );
        let session = registry.get(&id).unwrap();
        assert_eq!(session.battery, Some(75.0));
        assert_eq!(session.info["carrier"], json!("att"));
        assert_eq!(session.info["rooted"], json!(true));
        assert_eq!(session.info["sim"], json!("a"));
    }

    #[test]
    fn disconnect_detaches_channel_and_reconnect_gets_new_id() {
        let mut registry = DeviceRegistry::new();
        let old = registry.on_connect("ch-1", "10.0.0.5");
        registry.on_disconnect(&old, "transport close");
        assert!(registry.resolve_channel(&old).is_none());
        assert_eq!(registry.get(&old).unwrap().status, SessionStatus::Offline);
        assert!(registry.get(&old).unwrap().disconnected_at.is_some());

        let new = registry.on_connect("ch-2", "10.0.0.5");
        assert_ne!(old, new);
        // The old record is orphaned, not resurrected.
        assert!(registry.resolve_channel(&old).is_none());
        assert_eq!(registry.resolve_channel(&new).as_deref(), Some("ch-2"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn stale_sessions_are_demoted_and_fresh_ones_kept() {
        let mut registry = DeviceRegistry::new();
        let stale = registry.on_connect("ch-1", "10.0.0.5");
        let fresh = registry.on_connect("ch-2", "10.0.0.6");
        let now = now_millis();
        registry.sessions.get_mut(&stale).unwrap().last_seen = now - 130_000;

        let demoted = registry.mark_stale(now, 120_000);
        assert_eq!(demoted, vec![stale.clone()]);
        assert_eq!(registry.get(&stale).unwrap().status, SessionStatus::Offline);
        assert_eq!(registry.get(&fresh).unwrap().status, SessionStatus::Online);
        // Logical mark only: no disconnect timestamp.
        assert!(registry.get(&stale).unwrap().disconnected_at.is_none());
    }

    #[test]
    fn late_heartbeat_revives_a_stale_session() {
        let mut registry = DeviceRegistry::new();
        let id = registry.on_connect("ch-1", "10.0.0.5");
        let now = now_millis();
        registry.sessions.get_mut(&id).unwrap().last_seen = now - 130_000;
        registry.mark_stale(now, 120_000);

        registry.heartbeat(&id, &HeartbeatPayload::default());
        assert_eq!(registry.get(&id).unwrap().status, SessionStatus::Online);
    }

    #[test]
    fn prune_drops_only_old_offline_records() {
        let mut registry = DeviceRegistry::new();
        let old = registry.on_connect("ch-1", "10.0.0.5");
        let recent = registry.on_connect("ch-2", "10.0.0.6");
        let live = registry.on_connect("ch-3", "10.0.0.7");
        registry.on_disconnect(&old, "gone");
        registry.on_disconnect(&recent, "gone");
        let now = now_millis();
        registry.sessions.get_mut(&old).unwrap().last_seen = now - 100_000;

        let pruned = registry.prune_offline(now, 60_000);
        assert_eq!(pruned, 1);
        assert!(registry.get(&old).is_none());
        assert!(registry.get(&recent).is_some());
        assert!(registry.get(&live).is_some());
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn list_preserves_insertion_order() {
        let mut registry = DeviceRegistry::new();
        let a = registry.on_connect("ch-1", "10.0.0.5");
        let b = registry.on_connect("ch-2", "10.0.0.6");
        let ids: Vec<String> = registry.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a, b]);
    }
}
