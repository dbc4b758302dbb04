//! Mock sink connections shared by the unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use sinkpool_core::{ConnectionFactory, Result, SinkConnection, SinkError};

/// Mock connection that records what it was sent
pub(crate) struct MockConnection {
    closed: AtomicBool,
    fail_sends: AtomicBool,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

#[async_trait]
impl SinkConnection for MockConnection {
    fn sink_name(&self) -> &str {
        "mock"
    }

    async fn send(&self, record: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(SinkError::Send("connection closed".into()));
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SinkError::Send("broken pipe".into()));
        }
        self.sent.lock().push(record.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Mock factory that counts creations and keeps every connection it made
#[derive(Default)]
pub(crate) struct MockConnectionFactory {
    attempts: AtomicUsize,
    fail_creates: AtomicUsize,
    reject_validation: AtomicBool,
    fail_sends: AtomicBool,
    created: Mutex<Vec<Arc<MockConnection>>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockConnectionFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of `create` calls, including failed ones
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of connections successfully created
    pub(crate) fn count(&self) -> usize {
        self.created.lock().len()
    }

    /// Make the next `n` creations fail
    pub(crate) fn fail_next_creates(&self, n: usize) {
        self.fail_creates.store(n, Ordering::SeqCst);
    }

    pub(crate) fn reject_validation(&self, reject: bool) {
        self.reject_validation.store(reject, Ordering::SeqCst);
    }

    /// Make connections created from now on fail every send
    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn connection(&self, serial: usize) -> Arc<MockConnection> {
        self.created.lock()[serial].clone()
    }

    pub(crate) fn closed_count(&self) -> usize {
        self.created
            .lock()
            .iter()
            .filter(|conn| conn.is_closed())
            .count()
    }

    /// Every record sent through any connection of this factory
    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn SinkConnection>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .fail_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        let mut created = self.created.lock();
        let conn = Arc::new(MockConnection {
            closed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(self.fail_sends.load(Ordering::SeqCst)),
            sent: self.sent.clone(),
        });
        created.push(conn.clone());
        Ok(conn)
    }

    async fn validate(&self, conn: &dyn SinkConnection) -> bool {
        !conn.is_closed() && !self.reject_validation.load(Ordering::SeqCst)
    }
}
