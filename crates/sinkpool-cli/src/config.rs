//! `sinkpool.toml` loading
//!
//! Every table is optional and falls back to its defaults:
//!
//! ```toml
//! [pool]
//! max_size = 4
//! idle_timeout_ms = 30000
//!
//! [sink]
//! address = "127.0.0.1:9999"
//!
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 250
//!
//! [logging]
//! filter = "info"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sinkpool_connection::{PoolConfig, RetryPolicy, TcpSinkConfig};

use crate::logging::LoggingConfig;

/// Effective configuration for a sinkpool run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkpoolConfig {
    pub pool: PoolConfig,
    pub sink: TcpSinkConfig,
    pub retry: RetryPolicy,
    pub logging: LoggingConfig,
}

impl SinkpoolConfig {
    /// `<config_dir>/sinkpool/sinkpool.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sinkpool").join("sinkpool.toml"))
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Load `path` if given, otherwise the default file if it exists,
    /// otherwise the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pool.validate().context("invalid [pool] table")?;
        self.sink.validate().context("invalid [sink] table")?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }
}

#[cfg(test)]
mod tests;
