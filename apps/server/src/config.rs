//! Server configuration loading.
//!
//! Settings come from an optional TOML file; command-line arguments
//! override individual fields.

use std::net::IpAddr;
use std::path::Path;

use anyhow::Context;
use parley_relay::ServerConfig;

/// Loads a configuration file. Missing fields take their defaults.
pub fn load(path: &Path) -> anyhow::Result<ServerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: ServerConfig =
        toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Builds the effective configuration from an optional file and CLI overrides.
pub fn resolve(
    path: Option<&Path>,
    port: Option<u16>,
    bind: Option<IpAddr>,
) -> anyhow::Result<ServerConfig> {
    let mut config = match path {
        Some(path) => load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(bind) = bind {
        config.bind_address = bind;
    }
    config.validate()?;
    Ok(config)
}
