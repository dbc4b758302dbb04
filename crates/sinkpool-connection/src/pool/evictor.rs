//! Background eviction of idle connections
//!
//! Periodically calls [`ConnectionPool::evict_idle`] with the pool's
//! configured idle timeout, so long-lived pools do not hold sockets open
//! between bursts of output.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::pool::ConnectionPool;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running idle-eviction task.
///
/// The task stops when [`stop`](Self::stop) is called, when the handle is
/// dropped, or when the pool is shut down.
pub struct IdleEvictor {
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    evicted: Arc<AtomicU64>,
}

impl IdleEvictor {
    /// Spawn an evictor using the pool's `eviction_interval` and `idle_timeout`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(pool: Arc<ConnectionPool>) -> Self {
        let interval = pool.config().eviction_interval();
        let idle_timeout = pool.config().idle_timeout();
        Self::spawn_with(pool, interval, idle_timeout)
    }

    /// Spawn an evictor with an explicit scan interval and idle timeout.
    ///
    /// Intervals below 1ms are raised to 1ms.
    pub fn spawn_with(pool: Arc<ConnectionPool>, interval: Duration, idle_timeout: Duration) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let evicted = Arc::new(AtomicU64::new(0));
        let counter = evicted.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so a fresh pool is not scanned.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                match pool.evict_idle(idle_timeout).await {
                    Ok(count) => {
                        counter.fetch_add(count as u64, Ordering::SeqCst);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "stopping idle evictor");
                        break;
                    }
                }
            }
        });

        tracing::debug!(?interval, ?idle_timeout, "idle evictor started");

        Self {
            stop_tx,
            task: Some(task),
            evicted,
        }
    }

    /// Total connections evicted by this task so far
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::SeqCst)
    }

    /// Check if the background task has exited
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }

    /// Stop the task and wait for it to exit
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "idle evictor task failed");
            }
        }
    }
}

impl Drop for IdleEvictor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
