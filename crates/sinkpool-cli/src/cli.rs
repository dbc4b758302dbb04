//! sinkpool - write partitioned records to a socket sink through a shared,
//! lazily populated connection pool.
//!
//! `sinkpool send` splits its input into partitions and writes each one over
//! a pooled TCP connection; `sinkpool listen` is a matching line server.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod logging;

use crate::commands::listen::ListenArgs;
use crate::commands::send::SendArgs;
use crate::config::SinkpoolConfig;

#[derive(Parser, Debug)]
#[command(
    name = "sinkpool",
    author,
    version,
    about = "Write partitioned records to a socket sink through a connection pool"
)]
struct Cli {
    /// Path to a sinkpool.toml configuration file
    #[arg(long, short, global = true, env = "SINKPOOL_CONFIG")]
    config: Option<PathBuf>,

    /// Default log filter (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    log_filter: Option<String>,

    /// Also write JSON logs to this directory
    #[arg(long, global = true)]
    json_log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split records into partitions and write them to the sink
    Send(SendArgs),
    /// Accept sink connections and print received records
    Listen(ListenArgs),
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SinkpoolConfig::load_or_default(cli.config.as_deref())?;
    if let Some(filter) = cli.log_filter {
        config.logging.filter = filter;
    }
    if let Some(dir) = cli.json_log_dir {
        config.logging.json = true;
        config.logging.log_dir = Some(dir);
    }
    let _log_guard = logging::init(&config.logging)?;

    match cli.command {
        Commands::Send(args) => {
            args.apply(&mut config)?;
            commands::send::run(args, config).await
        }
        Commands::Listen(args) => commands::listen::run(args).await,
        Commands::Config => commands::print_config(&config),
    }
}
