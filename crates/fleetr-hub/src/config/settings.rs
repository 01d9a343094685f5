use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors_origins: Option<Vec<String>>,
    /// Interval between liveness sweeps, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_interval_ms: Option<u64>,
    /// Silence after which an online session is marked offline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness_timeout_ms: Option<i64>,
    /// How long offline session records are kept before pruning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline_retention_ms: Option<i64>,
    /// Ring-buffer cap on retained command history entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_history_cap: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_history_limit: Option<usize>,
}

pub fn settings_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

/// Read settings from file. Returns defaults if the file doesn't exist;
/// errors if it exists but cannot be parsed (to avoid silent data loss).
pub fn read_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
    Ok(settings)
}

/// Write settings atomically (temp file + rename).
pub fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
