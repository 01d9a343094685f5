use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::web::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/server/info", get(server_info))
}

async fn server_info(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let environment = std::env::var("FLEETR_ENV").unwrap_or_else(|_| "development".into());
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "server": {
                "name": "fleetr hub",
                "version": env!("CARGO_PKG_VERSION"),
                "environment": environment,
            },
            "stats": {
                "connectedDevices": state.engine.device_count().await,
                "onlineDevices": state.engine.online_count().await,
                "commandsProcessed": state.engine.commands_processed().await,
                "uptime": state.engine.uptime_secs(),
            },
        })),
    )
}
