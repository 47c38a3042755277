use std::{fs, net::SocketAddr, path::Path};

use anyhow::Context;
use promgate_core::HandlerConfig;
use promgate_observe::LoggerConfig;
use serde::Deserialize;

/// Demo server configuration, read from an optional JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub logger: LoggerConfig,
    pub handler: HandlerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 9898)),
            logger: LoggerConfig::default(),
            handler: HandlerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}
