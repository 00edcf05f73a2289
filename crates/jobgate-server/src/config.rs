//! Server configuration loaded from TOML

use crate::error::{Result, ServerError};
use jobgate_engine::SchedulingPolicy;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const LISTEN_ADDR_ENV: &str = "JOBGATE_LISTEN_ADDR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: SocketAddr,
    pub log: LogConfig,
    pub scheduling: SchedulingPolicy,
    /// JSON seed for the in-memory stores
    pub seed_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 3030)),
            log: LogConfig::default(),
            scheduling: SchedulingPolicy::default(),
            seed_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info,jobgate_engine=debug`
    pub filter: String,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
        }
    }
}

impl ServerConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Load a config file, resolving a relative `seed_path` against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let mut config = Self::from_toml(&raw)?;

        if let (Some(seed), Some(dir)) = (&config.seed_path, path.parent()) {
            if seed.is_relative() {
                config.seed_path = Some(dir.join(seed));
            }
        }
        Ok(config)
    }

    /// Apply `JOBGATE_LISTEN_ADDR` if set
    pub fn with_env_overrides(self) -> Result<Self> {
        match std::env::var(LISTEN_ADDR_ENV) {
            Ok(addr) => self.with_listen_override(&addr),
            Err(_) => Ok(self),
        }
    }

    fn with_listen_override(mut self, addr: &str) -> Result<Self> {
        self.listen_address = addr
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid {LISTEN_ADDR_ENV} {addr:?}: {e}")))?;
        Ok(self)
    }
}
