pub mod commands;
pub mod devices;
pub mod server_info;

use axum::Router;

use super::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(devices::router())
        .merge(commands::router())
        .merge(server_info::router())
}
