use super::settings::{read_settings, settings_file_path, write_settings};
use anyhow::Result;
use std::path::Path;

pub struct ServerSettings {
    pub listen_host: String,
    pub listen_port: u16,
    pub cors_origins: Vec<String>,
    pub sweep_interval_ms: u64,
    pub liveness_timeout_ms: i64,
    pub offline_retention_ms: i64,
    pub command_history_cap: usize,
    pub default_history_limit: usize,
}

fn parse_cors_origins(s: &str) -> Vec<String> {
    let entries: Vec<String> = s
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if entries.iter().any(|e| e == "*") {
        return vec!["*".into()];
    }
    entries
}

/// Resolve server settings: env > settings file > default. Env values are
/// written back into the file the first time they are seen.
pub fn load_server_settings(data_dir: &Path) -> Result<ServerSettings> {
    let settings_path = settings_file_path(data_dir);
    let mut settings = read_settings(&settings_path)?;
    let mut needs_save = false;

    let listen_host = if let Ok(v) = std::env::var("FLEETR_LISTEN_HOST") {
        if settings.listen_host.is_none() {
            settings.listen_host = Some(v.clone());
            needs_save = true;
        }
        v
    } else if let Some(ref v) = settings.listen_host {
        v.clone()
    } else {
        "0.0.0.0".into()
    };

    let listen_port = if let Ok(v) =
        std::env::var("FLEETR_LISTEN_PORT").or_else(|_| std::env::var("PORT"))
    {
        let port: u16 = v
            .parse()
            .map_err(|_| anyhow::anyhow!("FLEETR_LISTEN_PORT must be a valid port"))?;
        if settings.listen_port.is_none() {
            settings.listen_port = Some(port);
            needs_save = true;
        }
        port
    } else if let Some(v) = settings.listen_port {
        v
    } else {
        3000
    };

    let cors_origins = if let Ok(v) = std::env::var("CORS_ORIGINS") {
        let origins = parse_cors_origins(&v);
        if settings.cors_origins.is_none() {
            settings.cors_origins = Some(origins.clone());
            needs_save = true;
        }
        origins
    } else if let Some(ref v) = settings.cors_origins {
        v.clone()
    } else {
        vec!["*".into()]
    };

    if needs_save {
        write_settings(&settings_path, &settings)?;
    }

    Ok(ServerSettings {
        listen_host,
        listen_port,
        cors_origins,
        sweep_interval_ms: settings.sweep_interval_ms.unwrap_or(30_000),
        liveness_timeout_ms: settings.liveness_timeout_ms.unwrap_or(120_000),
        offline_retention_ms: settings.offline_retention_ms.unwrap_or(24 * 60 * 60 * 1000),
        command_history_cap: settings.command_history_cap.unwrap_or(1000),
        default_history_limit: settings.default_history_limit.unwrap_or(50),
    })
}
