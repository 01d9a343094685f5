pub mod command_log;
pub mod device_registry;
pub mod event_publisher;

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use fleetr_shared::protocol::{
    self, CommandResultPayload, DataPayload, HeartbeatPayload, RegisterPayload,
};
use fleetr_shared::schemas::{BroadcastEvent, Command, Session};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Configuration;
use crate::ws::connection_manager::ConnectionManager;
use command_log::CommandLog;
use device_registry::DeviceRegistry;
use event_publisher::EventPublisher;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Why a dispatch was refused. Distinct conditions so the boundary can
/// report "not found" and "not connected" separately, with no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    UnknownTarget,
    ChannelUnavailable,
}

/// The central engine coordinating sessions, commands, liveness, and
/// broadcast.
///
/// Each shared container sits behind its own `RwLock` so the engine can be
/// shared as `Arc<HubEngine>`. Locks are never held across a send: mutate,
/// release, then notify.
pub struct HubEngine {
    publisher: EventPublisher,
    registry: RwLock<DeviceRegistry>,
    commands: RwLock<CommandLog>,
    conn_mgr: Arc<ConnectionManager>,
    started_at: Instant,
    liveness_timeout_ms: i64,
    offline_retention_ms: i64,
}

impl HubEngine {
    pub fn new(conn_mgr: Arc<ConnectionManager>, config: &Configuration) -> Self {
        Self {
            publisher: EventPublisher::new(conn_mgr.clone()),
            registry: RwLock::new(DeviceRegistry::new()),
            commands: RwLock::new(CommandLog::new(config.command_history_cap)),
            conn_mgr,
            started_at: Instant::now(),
            liveness_timeout_ms: config.liveness_timeout_ms,
            offline_retention_ms: config.offline_retention_ms,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.conn_mgr
    }

    /// In-process observer stream of everything fanned out over WebSocket.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.publisher.subscribe()
    }

    // --- Session lifecycle ---

    /// A new transport connection arrived: allocate its session and greet it.
    pub async fn handle_connect(&self, channel_id: &str, remote_addr: &str) -> String {
        let session_id = {
            let mut registry = self.registry.write().await;
            registry.on_connect(channel_id, remote_addr)
        };
        info!(session_id = %session_id, remote_addr = %remote_addr, "agent connected");
        let welcome = protocol::welcome(&session_id, now_millis());
        self.send_message(channel_id, &welcome).await;
        session_id
    }

    pub async fn handle_register(&self, session_id: &str, payload: RegisterPayload) {
        let applied = {
            let mut registry = self.registry.write().await;
            registry.register(session_id, &payload)
        };
        let Some(applied) = applied else {
            debug!(session_id = %session_id, "register for unknown session ignored");
            return;
        };
        info!(session_id = %session_id, name = %applied.name, "agent registered");

        if let Some(ref channel) = applied.channel_id {
            self.send_message(channel, &protocol::registered(session_id)).await;
        }
        self.publisher
            .emit(BroadcastEvent::DeviceConnected {
                device_id: session_id.to_string(),
                name: applied.name,
                device_type: applied.device_type,
                timestamp: now_millis(),
            })
            .await;
    }

    pub async fn handle_heartbeat(&self, session_id: &str, payload: HeartbeatPayload) {
        let channel = {
            let mut registry = self.registry.write().await;
            registry.heartbeat(session_id, &payload)
        };
        match channel {
            Some(Some(channel)) => {
                self.send_message(&channel, &protocol::heartbeat_ack(now_millis())).await;
            }
            Some(None) => {}
            None => debug!(session_id = %session_id, "heartbeat for unknown session ignored"),
        }
    }

    pub async fn handle_disconnect(&self, session_id: &str, reason: &str) {
        let name = {
            let mut registry = self.registry.write().await;
            registry.on_disconnect(session_id, reason)
        };
        let Some(name) = name else {
            return;
        };
        info!(session_id = %session_id, reason = %reason, "agent disconnected");
        self.publisher
            .emit(BroadcastEvent::DeviceDisconnected {
                device_id: session_id.to_string(),
                name,
                reason: reason.to_string(),
                timestamp: now_millis(),
            })
            .await;
    }

    // --- Command dispatch and correlation ---

    /// Fire-and-forget: appends a `sent` record and pushes the command onto
    /// the agent's channel. Never waits for the result.
    pub async fn dispatch(
        &self,
        device_id: &str,
        action: &str,
        payload: Value,
    ) -> Result<Command, DispatchError> {
        let channel = {
            let registry = self.registry.read().await;
            let session = registry.get(device_id).ok_or(DispatchError::UnknownTarget)?;
            session
                .channel_id
                .clone()
                .ok_or(DispatchError::ChannelUnavailable)?
        };

        let command = Command {
            command_id: Uuid::new_v4().to_string(),
            device_id: device_id.to_string(),
            action: action.to_string(),
            payload,
            status: "sent".to_string(),
            result: None,
            issued_at: now_millis(),
            completed_at: None,
        };
        self.commands.write().await.append(command.clone());

        let msg = protocol::command(
            &command.command_id,
            &command.action,
            &command.payload,
            command.issued_at,
        );
        if !self.send_message(&channel, &msg).await {
            // The channel died between resolve and send; the record stays
            // `sent` and liveness will catch the session.
            debug!(command_id = %command.command_id, "command send failed");
        }
        info!(command_id = %command.command_id, device_id = %device_id, action = %action, "command dispatched");
        Ok(command)
    }

    pub async fn handle_command_result(&self, session_id: &str, payload: CommandResultPayload) {
        let status = payload.status.as_deref().unwrap_or("completed").to_string();
        let now = now_millis();
        let found = self.commands.write().await.correlate(
            &payload.command_id,
            &status,
            payload.result.clone(),
            now,
        );
        if !found {
            debug!(command_id = %payload.command_id, "result for unknown command dropped");
        }
        self.publisher
            .emit(BroadcastEvent::CommandCompleted {
                device_id: session_id.to_string(),
                command_id: payload.command_id,
                status,
                result: payload.result,
                timestamp: now,
            })
            .await;
    }

    pub async fn handle_data(&self, session_id: &str, payload: DataPayload) {
        self.publisher
            .emit(BroadcastEvent::NewData {
                device_id: session_id.to_string(),
                data_type: payload.kind.unwrap_or_else(|| "unknown".to_string()),
                data: payload.data,
                timestamp: now_millis(),
            })
            .await;
    }

    // --- Liveness sweep ---

    /// Periodic sweep: probe every online channel, demote sessions silent
    /// past the threshold, prune offline records past retention.
    pub async fn sweep_liveness(&self) {
        let targets = {
            let registry = self.registry.read().await;
            registry.online_channels()
        };
        let now = now_millis();
        let ping = protocol::ping(now);
        for (_, channel) in &targets {
            self.send_message(channel, &ping).await;
        }

        let (demoted, pruned) = {
            let mut registry = self.registry.write().await;
            let demoted = registry.mark_stale(now, self.liveness_timeout_ms);
            let pruned = registry.prune_offline(now, self.offline_retention_ms);
            (demoted, pruned)
        };
        for id in &demoted {
            info!(session_id = %id, "session marked offline by liveness sweep");
        }
        if pruned > 0 {
            info!(count = pruned, "pruned offline session records");
        }
    }

    // --- Read accessors for the administrative boundary ---

    pub async fn list_devices(&self) -> Vec<Session> {
        self.registry.read().await.list()
    }

    pub async fn history(&self, device_id: Option<&str>, limit: usize) -> Vec<Command> {
        self.commands.read().await.history(device_id, limit)
    }

    pub async fn device_count(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn online_count(&self) -> usize {
        self.registry.read().await.online_count()
    }

    pub async fn commands_processed(&self) -> u64 {
        self.commands.read().await.total_dispatched()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    async fn send_message(&self, channel: &str, msg: &protocol::WsMessage) -> bool {
        match serde_json::to_string(msg) {
            Ok(text) => self.conn_mgr.send_to(channel, &text).await,
            Err(_) => false,
        }
    }
}
