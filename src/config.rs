//! Configuration loading and management.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Top-level daemon configuration, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
}

/// The `[server]` block.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Exchange name, used in logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// Address the client listener binds to.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Maximum number of simultaneously registered extensions.
    #[serde(default = "default_max_extensions")]
    pub max_extensions: usize,

    /// Prometheus HTTP port. 0 disables the endpoint (used by tests).
    pub metrics_port: Option<u16>,
}

fn default_name() -> String {
    "pbx".to_string()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 6000))
}

fn default_max_extensions() -> usize {
    1024
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Config> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.server.max_extensions == 0 {
            anyhow::bail!("server.max_extensions must be at least 1");
        }
        Ok(())
    }
}
