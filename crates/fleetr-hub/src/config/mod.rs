pub mod server_settings;
pub mod settings;

use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Configuration {
    pub data_dir: PathBuf,
    pub settings_file: PathBuf,
    pub listen_host: String,
    pub listen_port: u16,
    pub cors_origins: Vec<String>,
    pub sweep_interval_ms: u64,
    pub liveness_timeout_ms: i64,
    pub offline_retention_ms: i64,
    pub command_history_cap: usize,
    pub default_history_limit: usize,
}

impl Configuration {
    pub fn create() -> Result<Self> {
        // Resolve data directory: FLEETR_HOME env or ~/.fleetr
        let data_dir = if let Ok(home) = std::env::var("FLEETR_HOME") {
            PathBuf::from(home)
        } else {
            let home = dirs_next::home_dir()
                .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
            home.join(".fleetr")
        };
        std::fs::create_dir_all(&data_dir)?;

        let settings_file = settings::settings_file_path(&data_dir);
        let ss = server_settings::load_server_settings(&data_dir)?;

        Ok(Configuration {
            data_dir,
            settings_file,
            listen_host: ss.listen_host,
            listen_port: ss.listen_port,
            cors_origins: ss.cors_origins,
            sweep_interval_ms: ss.sweep_interval_ms,
            liveness_timeout_ms: ss.liveness_timeout_ms,
            offline_retention_ms: ss.offline_retention_ms,
            command_history_cap: ss.command_history_cap,
            default_history_limit: ss.default_history_limit,
        })
    }
}
