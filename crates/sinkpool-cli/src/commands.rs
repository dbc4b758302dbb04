//! Subcommand implementations

pub mod listen;
pub mod send;

use anyhow::Result;

use crate::config::SinkpoolConfig;

/// Print the effective configuration as TOML
pub fn print_config(config: &SinkpoolConfig) -> Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
