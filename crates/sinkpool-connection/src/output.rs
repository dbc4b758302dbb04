//! Partition-level output through a shared connection pool
//!
//! Each partition acquires one connection, sends all of its records, and
//! releases the connection, so connection setup is paid per partition at
//! most, and usually not at all once the pool is warm.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sinkpool_connection::output::{foreach_partition, split_into_partitions, RetryPolicy};
//!
//! let partitions = split_into_partitions(lines, 4);
//! let summary = foreach_partition(pool.clone(), partitions, &RetryPolicy::default()).await;
//! println!("sent {} records", summary.records_sent());
//! ```

mod partition;
mod retry;


pub use partition::{
    OutputSummary, PartitionOutcome, PartitionReport, foreach_partition, split_into_partitions,
    write_partition, write_partition_with_retry,
};
pub use retry::RetryPolicy;
