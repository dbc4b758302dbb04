//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Statistics about a connection pool's current state
///
/// Provides insight into pool utilization and churn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of idle connections available in the pool
    idle: usize,
    /// Number of connections currently checked out
    active: usize,
    /// Number of requests waiting for a connection
    waiting: usize,
    /// Connections created over the pool's lifetime
    created: u64,
    /// Connections closed over the pool's lifetime (evicted, discarded or shut down)
    closed: u64,
}

impl PoolStats {
    /// Create new pool statistics
    pub fn new(idle: usize, active: usize, waiting: usize, created: u64, closed: u64) -> Self {
        Self {
            idle,
            active,
            waiting,
            created,
            closed,
        }
    }

    /// Get the total number of tracked connections (idle + active)
    pub fn total(&self) -> usize {
        self.idle + self.active
    }

    /// Get the number of idle connections
    pub fn idle(&self) -> usize {
        self.idle
    }

    /// Get the number of active (checked-out) connections
    pub fn active(&self) -> usize {
        self.active
    }

    /// Get the number of waiting requests
    pub fn waiting(&self) -> usize {
        self.waiting
    }

    /// Get the number of connections created so far
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Get the number of connections closed so far
    pub fn closed(&self) -> u64 {
        self.closed
    }

    /// Calculate pool utilization as a percentage (0.0 to 1.0)
    ///
    /// Returns 0.0 if total is 0 to avoid division by zero.
    pub fn utilization(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.active as f64 / total as f64
        }
    }

    /// Check if the pool is fully utilized (all connections in use)
    pub fn is_full(&self) -> bool {
        self.idle == 0 && self.total() > 0
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new(0, 0, 0, 0, 0)
    }
}
