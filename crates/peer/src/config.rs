use std::path::Path;

use anyhow::{Context, Result};

use rally::{PacketLossSimulation, SyncConfig};

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub bind_addr: String,
    pub peer_addr: Option<String>,
    pub peer_id: u32,
    pub sync: SyncConfig,
    pub link: Option<PacketLossSimulation>,
    pub autoplay: bool,
    pub duration_secs: Option<u64>,
}

/// Defaults, optionally overridden field by field from a JSON file.
pub fn load_sync_config(path: Option<&Path>) -> Result<SyncConfig> {
    let Some(path) = path else {
        return Ok(SyncConfig::default());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = parse_sync_config(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;
    log::info!("loaded sync config from {}", path.display());
    Ok(config)
}

pub fn parse_sync_config(raw: &str) -> Result<SyncConfig> {
    let config: SyncConfig = serde_json::from_str(raw)?;
    config.validate()?;
    Ok(config)
}
