//! sinkpool connection - Pooled connections for partitioned sink output
//!
//! This crate handles the connection lifecycle between partition output tasks
//! and an external sink: lazy pooling with idle eviction, the per-partition
//! acquire / send / release bracket, and a TCP socket sink.

pub mod output;
pub mod pool;
pub mod sinks;

#[cfg(test)]
pub(crate) mod testing;

pub use output::{
    OutputSummary, PartitionReport, RetryPolicy, foreach_partition, split_into_partitions,
    write_partition,
};
pub use pool::{ConnectionPool, IdleEvictor, PoolConfig, PoolStats, PooledConnection};
pub use sinks::{TcpSinkConfig, TcpSinkConnection, TcpSinkFactory};
