//! `sinkpool send`: split records into partitions and write them to a TCP sink

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};
use serde_json::json;
use sinkpool_connection::{
    ConnectionPool, IdleEvictor, OutputSummary, PoolStats, TcpSinkFactory, foreach_partition,
    split_into_partitions,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::info;

use crate::config::SinkpoolConfig;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// File of newline-delimited records, `-` for stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Sink address (host:port)
    #[arg(long, short, env = "SINKPOOL_ADDRESS")]
    pub address: Option<String>,

    /// Number of partitions to split the records into
    #[arg(long, short, default_value_t = 4)]
    pub partitions: usize,

    /// Maximum connections checked out at once
    #[arg(long, env = "SINKPOOL_MAX_CONNECTIONS")]
    pub max_connections: Option<usize>,

    /// Close connections idle for this long (milliseconds)
    #[arg(long)]
    pub idle_timeout_ms: Option<u64>,

    /// Attempts per partition, including the first
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Print the summary as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl SendArgs {
    /// Overlay command-line flags on the file configuration
    pub fn apply(&self, config: &mut SinkpoolConfig) -> Result<()> {
        if let Some(address) = &self.address {
            config.sink = config.sink.clone().with_address(address.clone());
        }
        if let Some(max_connections) = self.max_connections {
            if max_connections == 0 {
                bail!("--max-connections must be greater than 0");
            }
            config.pool = config.pool.clone().with_max_size(max_connections);
        }
        if let Some(idle_timeout_ms) = self.idle_timeout_ms {
            config.pool = config.pool.clone().with_idle_timeout_ms(idle_timeout_ms);
        }
        if let Some(attempts) = self.attempts {
            config.retry = config.retry.clone().with_max_attempts(attempts);
        }
        config.validate()
    }
}

pub async fn run(args: SendArgs, config: SinkpoolConfig) -> Result<()> {
    let records = read_input(&args.input).await?;
    let partitions = split_into_partitions(records, args.partitions);

    let pool = Arc::new(ConnectionPool::new(
        config.pool.clone(),
        TcpSinkFactory::new(config.sink.clone()),
    ));
    let evictor = IdleEvictor::spawn(pool.clone());

    info!(
        address = config.sink.address(),
        partitions = partitions.len(),
        max_connections = config.pool.max_size(),
        "sending records"
    );
    let summary = foreach_partition(pool.clone(), partitions, &config.retry).await;
    let stats = pool.stats();

    evictor.stop().await;
    pool.shutdown().await.context("failed to shut down connection pool")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&summary, &stats))?);
    } else {
        println!("{}", summary_table(&summary));
        println!(
            "{} records sent, {} connections opened",
            summary.records_sent(),
            stats.created()
        );
    }

    let failed = summary.failures().count();
    if failed > 0 {
        bail!("{} of {} partitions failed", failed, summary.partitions.len());
    }
    Ok(())
}

async fn read_input(path: &Path) -> Result<Vec<String>> {
    if path.as_os_str() == "-" {
        read_records(tokio::io::stdin()).await.context("failed to read stdin")
    } else {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        read_records(file)
            .await
            .with_context(|| format!("failed to read {}", path.display()))
    }
}

/// Read newline-delimited records, dropping blank lines
pub async fn read_records<R: AsyncRead + Unpin>(reader: R) -> std::io::Result<Vec<String>> {
    let mut lines = BufReader::new(reader).lines();
    let mut records = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            records.push(line);
        }
    }
    Ok(records)
}

fn summary_table(summary: &OutputSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Partition", "Records", "Connection", "Attempts", "Status"]);

    for outcome in &summary.partitions {
        let row = match &outcome.result {
            Ok(report) => vec![
                report.partition.to_string(),
                report.records.to_string(),
                report
                    .connection_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                report.attempts.to_string(),
                "ok".to_string(),
            ],
            Err(e) => vec![
                outcome.partition.to_string(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
                format!("failed: {}", e),
            ],
        };
        table.add_row(row);
    }
    table
}

fn summary_json(summary: &OutputSummary, stats: &PoolStats) -> serde_json::Value {
    let partitions: Vec<_> = summary
        .partitions
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(report) => json!(report),
            Err(e) => json!({ "partition": outcome.partition, "error": e.to_string() }),
        })
        .collect();

    json!({
        "records_sent": summary.records_sent(),
        "partitions": partitions,
        "pool": stats,
    })
}
