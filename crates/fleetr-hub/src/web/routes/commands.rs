use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::sync::DispatchError;
use crate::web::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/command", post(submit_command))
        .route("/commands", get(command_history))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandBody {
    device_id: String,
    command: String,
    #[serde(default)]
    data: Value,
}

async fn submit_command(
    State(state): State<AppState>,
    body: Result<Json<CommandBody>, axum::extract::rejection::JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(body) = match body {
        Ok(b) => b,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "message": "Invalid body"})),
            );
        }
    };

    match state
        .engine
        .dispatch(&body.device_id, &body.command, body.data)
        .await
    {
        Ok(command) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Command sent successfully",
                "commandId": command.command_id,
                "deviceId": command.device_id,
                "command": command.action,
                "timestamp": command.issued_at,
            })),
        ),
        Err(DispatchError::UnknownTarget) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "message": "Device not found or offline"})),
        ),
        Err(DispatchError::ChannelUnavailable) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": "Device not connected via WebSocket"})),
        ),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    device_id: Option<String>,
    limit: Option<usize>,
}

async fn command_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> (StatusCode, Json<Value>) {
    let limit = query.limit.unwrap_or(state.default_history_limit);
    let commands = state
        .engine
        .history(query.device_id.as_deref(), limit)
        .await;
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "count": commands.len(),
            "commands": commands,
        })),
    )
}
