use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use fleetr_shared::schemas::DeviceSummary;
use serde_json::{json, Value};

use crate::web::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/devices", get(list_devices))
}

async fn list_devices(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let devices: Vec<DeviceSummary> = state
        .engine
        .list_devices()
        .await
        .iter()
        .map(|s| s.summary())
        .collect();
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "count": devices.len(),
            "devices": devices,
        })),
    )
}
