pub mod routes;

use std::sync::Arc;

use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;

use fleetr_shared::version::PROTOCOL_VERSION;

use crate::sync::HubEngine;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<HubEngine>,
    pub cors_origins: Vec<String>,
    pub default_history_limit: usize,
}

/// Build the axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    use tower_http::cors::AllowOrigin;

    let cors_origins = &state.cors_origins;
    let allow_origin = if cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<axum::http::HeaderValue> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    let cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_origin(allow_origin);

    let api_routes = routes::api_router().layer(cors);

    Router::new()
        .route("/health", axum::routing::get(health))
        .nest("/api", api_routes)
        .with_state(state)
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<serde_json::Value> {
    axum::Json(json!({
        "status": "online",
        "server": "fleetr hub",
        "version": env!("CARGO_PKG_VERSION"),
        "protocolVersion": PROTOCOL_VERSION,
        "connectedDevices": state.engine.device_count().await,
        "commandsProcessed": state.engine.commands_processed().await,
        "uptime": state.engine.uptime_secs(),
    }))
}
