//! Sink connection and factory traits

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Identifier assigned to a connection by the pool that created it.
///
/// Identifiers are unique within a pool and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle state of a connection as seen by its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Available for reuse
    Idle,
    /// Held by exactly one caller
    CheckedOut,
    /// Closed and no longer tracked. Terminal.
    Closed,
}

/// A connection to an external sink (socket server, database, ...)
///
/// Methods take `&self`; implementations use interior mutability so that a
/// connection can be shared as `Arc<dyn SinkConnection>`.
#[async_trait]
pub trait SinkConnection: Send + Sync {
    /// Short name of the sink kind (e.g., "tcp")
    fn sink_name(&self) -> &str;

    /// Send a single record to the sink
    async fn send(&self, record: &[u8]) -> Result<()>;

    /// Flush any buffered records
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Close the connection. Closing twice is a no-op.
    async fn close(&self) -> Result<()>;

    /// Check if the connection has been closed
    fn is_closed(&self) -> bool;

    /// Check, without blocking, whether the connection can still carry records
    ///
    /// Unlike [`is_closed`](Self::is_closed), which only reflects a local
    /// `close()`, implementations should also report a connection the remote
    /// end has hung up on. Defaults to `!is_closed()`.
    fn is_alive(&self) -> bool {
        !self.is_closed()
    }
}

/// Factory trait for creating new sink connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection
    async fn create(&self) -> Result<Arc<dyn SinkConnection>>;

    /// Validate that a connection is still usable
    ///
    /// Default implementation defers to [`SinkConnection::is_alive`].
    async fn validate(&self, conn: &dyn SinkConnection) -> bool {
        conn.is_alive()
    }
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn SinkConnection>> {
        (**self).create().await
    }

    async fn validate(&self, conn: &dyn SinkConnection) -> bool {
        (**self).validate(conn).await
    }
}
