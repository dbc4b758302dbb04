//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a connection pool
///
/// Controls pool sizing, timeouts, and connection lifecycle. Connections are
/// never pre-warmed, so there is no minimum size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of connections checked out at the same time
    max_size: usize,
    /// Timeout in milliseconds when waiting for a free slot
    acquire_timeout_ms: u64,
    /// Timeout in milliseconds before an idle connection is closed
    idle_timeout_ms: u64,
    /// Maximum lifetime of a connection in milliseconds before it's recycled
    max_lifetime_ms: Option<u64>,
    /// How often the background evictor scans idle connections
    eviction_interval_ms: u64,
    /// Validate connections through the factory when they are released
    test_on_release: bool,
}

impl PoolConfig {
    /// Create a new pool configuration with the given max size
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is 0.
    pub fn new(max_size: usize) -> Self {
        assert!(
            max_size > 0,
            "max_size must be greater than 0, got {}",
            max_size
        );

        Self {
            max_size,
            acquire_timeout_ms: 30_000, // 30 seconds default
            idle_timeout_ms: 600_000, // 10 minutes default
            max_lifetime_ms: None,
            eviction_interval_ms: 60_000, // 1 minute default
            test_on_release: false,
        }
    }

    /// Replace the maximum number of checked-out connections
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is 0.
    pub fn with_max_size(self, max_size: usize) -> Self {
        assert!(
            max_size > 0,
            "max_size must be greater than 0, got {}",
            max_size
        );
        Self { max_size, ..self }
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Set the idle timeout in milliseconds
    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    /// Set the maximum connection lifetime in milliseconds
    pub fn with_max_lifetime_ms(mut self, lifetime_ms: u64) -> Self {
        self.max_lifetime_ms = Some(lifetime_ms);
        self
    }

    /// Set the background eviction interval in milliseconds
    ///
    /// Values below 1ms are clamped to 1ms.
    pub fn with_eviction_interval_ms(mut self, interval_ms: u64) -> Self {
        self.eviction_interval_ms = interval_ms.max(1);
        self
    }

    /// Validate connections through the factory on release
    pub fn with_test_on_release(mut self, enabled: bool) -> Self {
        self.test_on_release = enabled;
        self
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Get the idle timeout as a Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Get the maximum lifetime as a Duration if set
    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_ms.map(Duration::from_millis)
    }

    /// Get the eviction interval as a Duration
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms.max(1))
    }

    pub fn test_on_release(&self) -> bool {
        self.test_on_release
    }

    /// Check values that serde cannot enforce on its own
    pub fn validate(&self) -> sinkpool_core::Result<()> {
        if self.max_size == 0 {
            return Err(sinkpool_core::SinkError::Configuration(
                "pool.max_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - max_size: 10
    /// - acquire_timeout: 30 seconds
    /// - idle_timeout: 10 minutes
    /// - max_lifetime: None
    /// - eviction_interval: 1 minute
    /// - test_on_release: false
    fn default() -> Self {
        Self::new(10)
    }
}
