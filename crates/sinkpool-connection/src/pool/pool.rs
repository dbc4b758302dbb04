//! Connection pool implementation

use std::collections::{HashMap, VecDeque};
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use sinkpool_core::{
    ConnectionFactory, ConnectionId, ConnectionState, Result, SinkConnection, SinkError,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use super::config::PoolConfig;
use super::stats::PoolStats;

/// Internal bookkeeping for a connection tracked by the pool
struct TrackedConnection {
    connection: Arc<dyn SinkConnection>,
    created_at: Instant,
    last_used_at: Instant,
    checked_out: bool,
}

/// An idle connection that was just moved to the checked-out state
struct IdleCandidate {
    id: ConnectionId,
    connection: Arc<dyn SinkConnection>,
    created_at: Instant,
    idle_since: Instant,
}

/// Pool state guarded by a single lock.
///
/// Every tracked connection is either checked out or listed exactly once in
/// `idle`.
#[derive(Default)]
struct PoolState {
    connections: HashMap<ConnectionId, TrackedConnection>,
    idle: VecDeque<ConnectionId>,
}

impl PoolState {
    fn pop_idle(&mut self) -> Option<IdleCandidate> {
        while let Some(id) = self.idle.pop_front() {
            if let Some(entry) = self.connections.get_mut(&id) {
                let idle_since = entry.last_used_at;
                entry.checked_out = true;
                entry.last_used_at = Instant::now();
                return Some(IdleCandidate {
                    id,
                    connection: entry.connection.clone(),
                    created_at: entry.created_at,
                    idle_since,
                });
            }
        }
        None
    }

    fn insert_checked_out(&mut self, id: ConnectionId, connection: Arc<dyn SinkConnection>) {
        let now = Instant::now();
        self.connections.insert(
            id,
            TrackedConnection {
                connection,
                created_at: now,
                last_used_at: now,
                checked_out: true,
            },
        );
    }

    fn is_checked_out(&self, id: ConnectionId) -> bool {
        self.connections
            .get(&id)
            .map(|entry| entry.checked_out)
            .unwrap_or(false)
    }

    /// Move a checked-out connection back to the idle queue
    fn checkin(&mut self, id: ConnectionId) -> bool {
        match self.connections.get_mut(&id) {
            Some(entry) if entry.checked_out => {
                entry.checked_out = false;
                entry.last_used_at = Instant::now();
                self.idle.push_back(id);
                true
            }
            _ => false,
        }
    }

    fn remove(&mut self, id: ConnectionId) -> Option<TrackedConnection> {
        let entry = self.connections.remove(&id)?;
        if !entry.checked_out {
            self.idle.retain(|idle_id| *idle_id != id);
        }
        Some(entry)
    }

    /// Remove idle connections that have been idle for at least `timeout`
    fn take_idle_older_than(
        &mut self,
        timeout: Duration,
    ) -> Vec<(ConnectionId, Arc<dyn SinkConnection>)> {
        let now = Instant::now();
        let mut expired = Vec::new();
        let connections = &mut self.connections;

        self.idle.retain(|id| {
            let stale = connections
                .get(id)
                .map(|entry| now.saturating_duration_since(entry.last_used_at) >= timeout)
                .unwrap_or(true);
            if stale {
                if let Some(entry) = connections.remove(id) {
                    expired.push((*id, entry.connection));
                }
            }
            !stale
        });

        expired
    }

    fn state_of(&self, id: ConnectionId) -> ConnectionState {
        match self.connections.get(&id) {
            Some(entry) if entry.checked_out => ConnectionState::CheckedOut,
            Some(_) => ConnectionState::Idle,
            None => ConnectionState::Closed,
        }
    }
}

async fn close_quietly(id: ConnectionId, connection: &dyn SinkConnection) {
    if let Err(e) = connection.close().await {
        tracing::warn!(connection_id = %id, error = %e, "failed to close sink connection");
    }
}

/// A pool of reusable connections to a single sink
///
/// Connections are created lazily on [`acquire`](Self::acquire) when no idle
/// connection is available, handed back with [`release`](Self::release) (or
/// by dropping the [`PooledConnection`]), and closed by
/// [`evict_idle`](Self::evict_idle) or [`shutdown`](Self::shutdown).
///
/// Share the pool between tasks as `Arc<ConnectionPool>`.
pub struct ConnectionPool {
    /// Pool configuration
    config: PoolConfig,
    /// Connection factory
    factory: Arc<dyn ConnectionFactory>,
    /// Tracked connections and the idle free-list
    state: Mutex<PoolState>,
    /// Semaphore to limit checked-out connections
    semaphore: Arc<Semaphore>,
    /// Source of connection identifiers
    next_id: AtomicU64,
    /// Number of requests waiting for a free slot
    waiting_count: AtomicUsize,
    /// Connections created over the pool's lifetime
    created_count: AtomicU64,
    /// Connections closed over the pool's lifetime
    closed_count: AtomicU64,
    /// Set once by `shutdown`
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Create a new connection pool with the given configuration and factory
    ///
    /// No connections are opened until the first `acquire`.
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_size()));
        Self {
            config,
            factory: Arc::new(factory),
            state: Mutex::new(PoolState::default()),
            semaphore,
            next_id: AtomicU64::new(1),
            waiting_count: AtomicUsize::new(0),
            created_count: AtomicU64::new(0),
            closed_count: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Get a connection from the pool
    ///
    /// This will:
    /// 1. Wait for a free slot if `max_size` connections are checked out (bounded by the acquire timeout)
    /// 2. Reuse the oldest idle connection that is still fresh and valid
    /// 3. Otherwise create a new connection through the factory
    ///
    /// Creation failures surface as `ConnectionCreation` and are not retried.
    pub async fn acquire(&self) -> Result<PooledConnection<'_>> {
        if self.is_closed() {
            return Err(SinkError::PoolClosed);
        }

        let mut permit = self.wait_for_slot().await?;

        loop {
            let candidate = self.state.lock().pop_idle();
            let Some(candidate) = candidate else {
                break;
            };

            // From here on a cancelled acquire hands the connection back on drop.
            let conn = PooledConnection::new(self, candidate.id, candidate.connection, permit);

            let reason = match self.stale_reason(candidate.created_at, candidate.idle_since) {
                Some(reason) => Some(reason),
                None => {
                    if self.factory.validate(&*conn).await {
                        None
                    } else {
                        Some("failed validation")
                    }
                }
            };

            match reason {
                Some(reason) => {
                    let (id, connection, slot) = conn.into_parts();
                    self.discard(id, connection, reason).await;
                    permit = slot;
                }
                None => {
                    tracing::debug!(connection_id = %conn.id(), "reusing idle sink connection");
                    return Ok(conn);
                }
            }
        }

        let connection = self
            .factory
            .create()
            .await
            .map_err(SinkError::into_creation_error)?;

        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let inserted = {
            let mut state = self.state.lock();
            if self.is_closed() {
                false
            } else {
                state.insert_checked_out(id, connection.clone());
                true
            }
        };
        if !inserted {
            close_quietly(id, &*connection).await;
            return Err(SinkError::PoolClosed);
        }
        self.created_count.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            connection_id = %id,
            sink = connection.sink_name(),
            "created new sink connection"
        );

        Ok(PooledConnection::new(self, id, connection, permit))
    }

    async fn wait_for_slot(&self) -> Result<OwnedSemaphorePermit> {
        self.waiting_count.fetch_add(1, Ordering::SeqCst);
        let result = tokio::time::timeout(
            self.config.acquire_timeout(),
            self.semaphore.clone().acquire_owned(),
        )
        .await;
        self.waiting_count.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(Ok(permit)) => Ok(permit),
            // The semaphore is only closed by shutdown
            Ok(Err(_)) => Err(SinkError::PoolClosed),
            Err(_) => Err(SinkError::Timeout(format!(
                "Timed out waiting for connection (timeout: {:?})",
                self.config.acquire_timeout()
            ))),
        }
    }

    fn stale_reason(&self, created_at: Instant, idle_since: Instant) -> Option<&'static str> {
        if let Some(max_lifetime) = self.config.max_lifetime() {
            if created_at.elapsed() >= max_lifetime {
                return Some("exceeded max lifetime");
            }
        }
        if idle_since.elapsed() >= self.config.idle_timeout() {
            return Some("exceeded idle timeout");
        }
        None
    }

    /// Return a connection to the pool for reuse
    ///
    /// Fails with `InvalidState` if the connection was not checked out from
    /// this pool, and with `PoolClosed` after shutdown. A connection that is
    /// closed, marked broken, or (with `test_on_release`) fails validation is
    /// closed and discarded instead of being queued; that is not an error.
    pub async fn release(&self, conn: PooledConnection<'_>) -> Result<()> {
        if !std::ptr::eq(conn.pool, self) {
            // Dropping `conn` hands it back to the pool it came from.
            return Err(SinkError::InvalidState(format!(
                "{} was not checked out from this pool",
                conn.id()
            )));
        }

        let broken = conn.is_broken();
        let (id, connection, _permit) = conn.into_parts();

        if self.is_closed() {
            close_quietly(id, &*connection).await;
            return Err(SinkError::PoolClosed);
        }

        if !self.state.lock().is_checked_out(id) {
            return Err(SinkError::InvalidState(format!("{} is not checked out", id)));
        }

        let discard_reason = if broken {
            Some("marked broken")
        } else if connection.is_closed() {
            Some("closed while checked out")
        } else if self.config.test_on_release() && !self.factory.validate(&*connection).await {
            Some("failed validation")
        } else {
            None
        };

        if let Some(reason) = discard_reason {
            self.discard(id, connection, reason).await;
            return Ok(());
        }

        if self.state.lock().checkin(id) {
            tracing::debug!(connection_id = %id, "released sink connection");
            Ok(())
        } else if self.is_closed() {
            Err(SinkError::PoolClosed)
        } else {
            Err(SinkError::InvalidState(format!("{} is not checked out", id)))
        }
    }

    /// Synchronous return path used when a `PooledConnection` is dropped
    fn return_on_drop(&self, id: ConnectionId, connection: Arc<dyn SinkConnection>, broken: bool) {
        let mut state = self.state.lock();

        if broken || connection.is_closed() {
            if state.remove(id).is_none() {
                return;
            }
            drop(state);
            self.closed_count.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(connection_id = %id, "discarding broken sink connection on drop");
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        close_quietly(id, &*connection).await;
                    });
                }
                Err(_) => {
                    tracing::debug!(
                        connection_id = %id,
                        "no tokio runtime, dropping sink connection without closing it"
                    );
                }
            }
            return;
        }

        if state.checkin(id) {
            tracing::debug!(connection_id = %id, "sink connection returned on drop");
        }
    }

    /// Remove a checked-out connection from the pool and close it
    async fn discard(&self, id: ConnectionId, connection: Arc<dyn SinkConnection>, reason: &str) {
        let removed = self.state.lock().remove(id).is_some();
        if removed {
            self.closed_count.fetch_add(1, Ordering::SeqCst);
        }
        tracing::warn!(connection_id = %id, reason, "discarding sink connection");
        close_quietly(id, &*connection).await;
    }

    /// Close and remove every idle connection idle for at least `timeout`
    ///
    /// Checked-out connections are never touched. Returns the number of
    /// connections evicted.
    pub async fn evict_idle(&self, timeout: Duration) -> Result<usize> {
        if self.is_closed() {
            return Err(SinkError::PoolClosed);
        }

        let (expired, remaining_idle) = {
            let mut state = self.state.lock();
            let expired = state.take_idle_older_than(timeout);
            (expired, state.idle.len())
        };

        let evicted = expired.len();
        self.closed_count.fetch_add(evicted as u64, Ordering::SeqCst);

        for (id, connection) in expired {
            close_quietly(id, &*connection).await;
        }

        if evicted > 0 {
            tracing::info!(evicted, remaining_idle, ?timeout, "evicted idle sink connections");
        }

        Ok(evicted)
    }

    /// Close every connection and refuse further use of the pool
    ///
    /// Idle connections are closed, and checked-out connections are closed
    /// out from under their holders. Calling `shutdown` twice fails with
    /// `PoolClosed`.
    pub async fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(SinkError::PoolClosed);
        }
        self.semaphore.close();

        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.idle.clear();
            state.connections.drain().collect()
        };

        let checked_out = drained.iter().filter(|(_, entry)| entry.checked_out).count();
        self.closed_count
            .fetch_add(drained.len() as u64, Ordering::SeqCst);

        for (id, entry) in &drained {
            close_quietly(*id, &*entry.connection).await;
        }

        tracing::info!(
            closed = drained.len(),
            checked_out,
            "connection pool shut down"
        );

        Ok(())
    }

    /// Check if the pool has been shut down
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Lifecycle state of a connection; untracked identifiers are `Closed`
    pub fn connection_state(&self, id: ConnectionId) -> ConnectionState {
        self.state.lock().state_of(id)
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let (idle, active) = {
            let state = self.state.lock();
            let idle = state.idle.len();
            (idle, state.connections.len() - idle)
        };
        PoolStats::new(
            idle,
            active,
            self.waiting_count.load(Ordering::SeqCst),
            self.created_count.load(Ordering::SeqCst),
            self.closed_count.load(Ordering::SeqCst),
        )
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

/// A connection checked out from the pool
///
/// Hand it back with [`ConnectionPool::release`]. When dropped instead, the
/// connection is returned to the pool automatically, or discarded if it was
/// marked broken or closed.
pub struct PooledConnection<'a> {
    id: ConnectionId,
    connection: Option<Arc<dyn SinkConnection>>,
    pool: &'a ConnectionPool,
    permit: Option<OwnedSemaphorePermit>,
    broken: bool,
}

impl<'a> PooledConnection<'a> {
    fn new(
        pool: &'a ConnectionPool,
        id: ConnectionId,
        connection: Arc<dyn SinkConnection>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            id,
            connection: Some(connection),
            pool,
            permit: Some(permit),
            broken: false,
        }
    }

    /// Identifier assigned by the pool
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Flag the connection as unusable so it is discarded instead of reused
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Get the underlying connection as an Arc
    pub fn inner(&self) -> &Arc<dyn SinkConnection> {
        self.connection.as_ref().expect("connection taken")
    }

    fn into_parts(mut self) -> (ConnectionId, Arc<dyn SinkConnection>, OwnedSemaphorePermit) {
        let connection = self.connection.take().expect("connection taken");
        let permit = self.permit.take().expect("permit taken");
        (self.id, connection, permit)
    }
}

impl Deref for PooledConnection<'_> {
    type Target = dyn SinkConnection;

    fn deref(&self) -> &Self::Target {
        self.inner().as_ref()
    }
}

impl std::fmt::Debug for PooledConnection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("broken", &self.broken)
            .finish()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            self.pool.return_on_drop(self.id, conn, self.broken);
        }
        // The permit is released after the connection is back in the idle queue.
        self.permit.take();
    }
}
