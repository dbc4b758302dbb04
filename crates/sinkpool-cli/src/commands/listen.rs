//! `sinkpool listen`: a line-oriented socket server that prints every record it receives

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind
    #[arg(long, short, default_value = "127.0.0.1:9999", env = "SINKPOOL_LISTEN")]
    pub bind: String,

    /// Exit after receiving this many records
    #[arg(long)]
    pub limit: Option<usize>,
}

pub async fn run(args: ListenArgs) -> Result<()> {
    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(address = %listener.local_addr()?, "listening for records");

    let (tx, mut rx) = mpsc::channel(1024);
    let acceptor = tokio::spawn(accept_loop(listener, tx));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut received = 0usize;
    while args.limit.is_none_or(|limit| received < limit) {
        tokio::select! {
            line = rx.recv() => match line {
                Some(line) => {
                    println!("{line}");
                    received += 1;
                }
                None => break,
            },
            _ = &mut shutdown => {
                debug!("interrupted");
                break;
            }
        }
    }

    acceptor.abort();
    info!(received, "listener stopped");
    Ok(())
}

const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Accept sink clients forever, forwarding their lines to `tx`
pub async fn accept_loop(listener: TcpListener, tx: mpsc::Sender<String>) {
    let mut consecutive_errors = 0u32;
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                consecutive_errors = 0;
                debug!(%peer, "sink client connected");
                tokio::spawn(forward_lines(socket, peer, tx.clone()));
            }
            Err(e) => {
                // Errors such as EMFILE persist until something frees up.
                consecutive_errors = consecutive_errors.saturating_add(1);
                let delay = accept_backoff(consecutive_errors);
                warn!(error = %e, ?delay, "failed to accept sink client");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Pause after `consecutive_errors` failed accepts: 10ms doubling up to 1s
fn accept_backoff(consecutive_errors: u32) -> Duration {
    let shift = consecutive_errors.saturating_sub(1).min(7);
    (Duration::from_millis(10) * (1 << shift)).min(MAX_ACCEPT_BACKOFF)
}

async fn forward_lines(socket: TcpStream, peer: SocketAddr, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(socket).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(%peer, error = %e, "failed to read from sink client");
                break;
            }
        }
    }
    debug!(%peer, "sink client disconnected");
}

#[cfg(test)]
mod tests;
