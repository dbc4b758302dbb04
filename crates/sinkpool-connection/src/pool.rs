//! Connection pooling for sink connections
//!
//! This module provides a lazily-populated pool with configurable sizing,
//! idle eviction, and statistics tracking.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sinkpool_connection::pool::{ConnectionPool, IdleEvictor, PoolConfig};
//!
//! let config = PoolConfig::new(8)
//!     .with_acquire_timeout_ms(5000)
//!     .with_idle_timeout_ms(300000);
//!
//! let pool = Arc::new(ConnectionPool::new(config, connection_factory));
//! let _evictor = IdleEvictor::spawn(pool.clone());
//!
//! let conn = pool.acquire().await?;
//! conn.send(b"record").await?;
//! pool.release(conn).await?;
//! ```

mod config;
mod evictor;
#[allow(clippy::module_inception)]
mod pool;
mod stats;


pub use config::PoolConfig;
pub use evictor::IdleEvictor;
pub use pool::{ConnectionPool, PooledConnection};
pub use stats::PoolStats;
