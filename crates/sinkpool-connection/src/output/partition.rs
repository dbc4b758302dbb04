//! Per-partition output over pooled connections

use std::sync::Arc;

use serde::Serialize;
use sinkpool_core::{ConnectionId, Result, SinkError};
use tracing::Instrument;

use super::retry::RetryPolicy;
use crate::pool::ConnectionPool;

/// Outcome of writing one partition successfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionReport {
    /// Zero-based partition index
    pub partition: usize,
    /// Records delivered
    pub records: usize,
    /// Connection used by the successful attempt (None for empty partitions)
    pub connection_id: Option<ConnectionId>,
    /// Attempts taken, including the successful one
    pub attempts: u32,
}

/// Result of one partition inside an [`OutputSummary`]
#[derive(Debug)]
pub struct PartitionOutcome {
    pub partition: usize,
    pub result: Result<PartitionReport>,
}

/// Results of a [`foreach_partition`] run, ordered by partition index
#[derive(Debug, Default)]
pub struct OutputSummary {
    pub partitions: Vec<PartitionOutcome>,
}

impl OutputSummary {
    /// Records delivered across all successful partitions
    pub fn records_sent(&self) -> usize {
        self.partitions
            .iter()
            .filter_map(|p| p.result.as_ref().ok())
            .map(|report| report.records)
            .sum()
    }

    /// Partitions that failed after exhausting their attempts
    pub fn failures(&self) -> impl Iterator<Item = (usize, &SinkError)> + '_ {
        self.partitions
            .iter()
            .filter_map(|p| p.result.as_ref().err().map(|e| (p.partition, e)))
    }

    pub fn is_success(&self) -> bool {
        self.partitions.iter().all(|p| p.result.is_ok())
    }
}

/// Write every record of one partition through a single pooled connection.
///
/// Acquires a connection, sends the records in order, flushes, and releases
/// the connection. If a send or flush fails the connection is marked broken
/// so the pool discards it, and the error is returned. Empty partitions do
/// not touch the pool.
pub async fn write_partition<R: AsRef<[u8]>>(
    pool: &ConnectionPool,
    partition: usize,
    records: &[R],
) -> Result<PartitionReport> {
    if records.is_empty() {
        return Ok(PartitionReport {
            partition,
            records: 0,
            connection_id: None,
            attempts: 1,
        });
    }

    let mut conn = pool.acquire().await?;
    let connection_id = conn.id();

    let mut outcome = Ok(());
    for record in records {
        outcome = conn.send(record.as_ref()).await;
        if outcome.is_err() {
            break;
        }
    }
    if outcome.is_ok() {
        outcome = conn.flush().await;
    }

    if let Err(err) = outcome {
        conn.mark_broken();
        if let Err(release_err) = pool.release(conn).await {
            tracing::warn!(%connection_id, error = %release_err, "failed to release broken connection");
        }
        return Err(err);
    }

    pool.release(conn).await?;

    tracing::debug!(partition, records = records.len(), %connection_id, "partition written");

    Ok(PartitionReport {
        partition,
        records: records.len(),
        connection_id: Some(connection_id),
        attempts: 1,
    })
}

/// Run [`write_partition`], retrying transient failures per `retry`.
///
/// Delivery is at-least-once: records sent before a failure are sent again
/// by the next attempt.
pub async fn write_partition_with_retry<R: AsRef<[u8]>>(
    pool: &ConnectionPool,
    partition: usize,
    records: &[R],
    retry: &RetryPolicy,
) -> Result<PartitionReport> {
    let mut failures = 0u32;

    loop {
        match write_partition(pool, partition, records).await {
            Ok(mut report) => {
                report.attempts = failures + 1;
                return Ok(report);
            }
            Err(err) => {
                failures += 1;
                if !err.is_transient() || !retry.should_retry(failures) {
                    tracing::error!(partition, attempts = failures, error = %err, "partition write failed");
                    return Err(err);
                }

                let delay = retry.delay_after(failures);
                tracing::warn!(
                    partition,
                    attempt = failures,
                    ?delay,
                    error = %err,
                    "partition write failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Write each partition on its own task, all sharing one pool.
///
/// Every partition runs the acquire / send / release bracket independently;
/// one failing partition does not stop the others. The summary lists every
/// partition in index order.
pub async fn foreach_partition<R>(
    pool: Arc<ConnectionPool>,
    partitions: Vec<Vec<R>>,
    retry: &RetryPolicy,
) -> OutputSummary
where
    R: AsRef<[u8]> + Send + Sync + 'static,
{
    let handles: Vec<_> = partitions
        .into_iter()
        .enumerate()
        .map(|(partition, records)| {
            let pool = pool.clone();
            let retry = retry.clone();
            let span = tracing::info_span!("partition", partition, records = records.len());
            let handle = tokio::spawn(
                async move { write_partition_with_retry(&pool, partition, &records, &retry).await }
                    .instrument(span),
            );
            (partition, handle)
        })
        .collect();

    let mut summary = OutputSummary::default();
    for (partition, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(SinkError::Other(format!("partition task failed: {}", e))),
        };
        summary.partitions.push(PartitionOutcome { partition, result });
    }

    summary
}

/// Split records into `count` contiguous partitions whose sizes differ by at most one.
///
/// A `count` of zero is treated as one. Trailing partitions may be empty when
/// there are fewer records than partitions.
pub fn split_into_partitions<R>(records: Vec<R>, count: usize) -> Vec<Vec<R>> {
    let count = count.max(1);
    let base = records.len() / count;
    let extra = records.len() % count;

    let mut iter = records.into_iter();
    (0..count)
        .map(|index| {
            let size = base + usize::from(index < extra);
            iter.by_ref().take(size).collect()
        })
        .collect()
}
