pub mod config;
pub mod sync;
pub mod web;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use config::Configuration;
use sync::HubEngine;
use web::AppState;
use ws::connection_manager::ConnectionManager;
use ws::WsState;

pub async fn run_hub() -> anyhow::Result<()> {
    let config = Configuration::create()?;

    info!(
        port = config.listen_port,
        host = %config.listen_host,
        sweep_interval_ms = config.sweep_interval_ms,
        liveness_timeout_ms = config.liveness_timeout_ms,
        "starting hub"
    );

    let conn_mgr = Arc::new(ConnectionManager::new());
    let engine = Arc::new(HubEngine::new(conn_mgr.clone(), &config));

    let app_state = AppState {
        engine: engine.clone(),
        cors_origins: config.cors_origins.clone(),
        default_history_limit: config.default_history_limit,
    };
    let ws_state = WsState {
        engine: engine.clone(),
    };

    let web_router = web::build_router(app_state);
    let ws_router = ws::ws_router(ws_state);
    let app = web_router.merge(ws_router);

    // Periodic liveness sweep: keepalive probes, stale demotion, pruning.
    let engine_for_sweep = engine.clone();
    let sweep_interval = std::time::Duration::from_millis(config.sweep_interval_ms);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.tick().await; // first tick completes immediately
        loop {
            interval.tick().await;
            engine_for_sweep.sweep_liveness().await;
        }
    });

    let addr = format!("{}:{}", config.listen_host, config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");

    // Use a Notify so we can trigger graceful shutdown from outside
    let shutdown_notify = Arc::new(tokio::sync::Notify::new());
    let shutdown_notify_srv = shutdown_notify.clone();

    let server_task = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown_notify_srv.notified().await;
        })
        .await
    });

    shutdown_signal().await;

    // Actively close all WebSocket connections
    info!("closing all WebSocket connections");
    conn_mgr.close_all().await;

    // Tell axum to stop accepting new connections
    shutdown_notify.notify_one();

    // Give axum up to 5s to finish, then force abort
    if tokio::time::timeout(std::time::Duration::from_secs(5), server_task)
        .await
        .is_err()
    {
        info!("graceful shutdown timed out, forcing exit");
    }

    info!("hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
