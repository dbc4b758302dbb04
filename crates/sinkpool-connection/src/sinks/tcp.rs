//! Newline-delimited TCP socket sink

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sinkpool_core::{ConnectionFactory, Result, SinkConnection, SinkError};
use tokio::io::{AsyncWriteExt, BufWriter, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Configuration for a TCP socket sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpSinkConfig {
    /// `host:port` of the socket server
    address: String,
    /// Timeout in milliseconds for establishing a connection
    connect_timeout_ms: u64,
    /// Disable Nagle's algorithm on new sockets
    nodelay: bool,
}

impl TcpSinkConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn nodelay(&self) -> bool {
        self.nodelay
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(SinkError::Configuration("sink.address must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for TcpSinkConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9999".to_string(),
            connect_timeout_ms: 5_000,
            nodelay: true,
        }
    }
}

/// Opens [`TcpSinkConnection`]s for a [`ConnectionPool`](crate::pool::ConnectionPool)
pub struct TcpSinkFactory {
    config: TcpSinkConfig,
}

impl TcpSinkFactory {
    pub fn new(config: TcpSinkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TcpSinkConfig {
        &self.config
    }
}

#[async_trait]
impl ConnectionFactory for TcpSinkFactory {
    async fn create(&self) -> Result<Arc<dyn SinkConnection>> {
        let address = self.config.address();
        let stream = tokio::time::timeout(self.config.connect_timeout(), TcpStream::connect(address))
            .await
            .map_err(|_| {
                SinkError::ConnectionCreation(format!(
                    "connect to {} timed out after {:?}",
                    address,
                    self.config.connect_timeout()
                ))
            })?
            .map_err(|e| SinkError::ConnectionCreation(format!("connect to {}: {}", address, e)))?;

        if self.config.nodelay() {
            stream.set_nodelay(true)?;
        }
        let peer = stream.peer_addr()?;
        tracing::debug!(%peer, "opened tcp sink connection");

        Ok(Arc::new(TcpSinkConnection::new(stream, peer)))
    }
}

/// A socket connection that writes each record followed by `\n`
///
/// Records are written verbatim; a record containing a newline arrives at
/// the server as several lines.
pub struct TcpSinkConnection {
    peer: SocketAddr,
    writer: Mutex<Option<BufWriter<TcpStream>>>,
    closed: AtomicBool,
}

impl TcpSinkConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            peer,
            writer: Mutex::new(Some(BufWriter::new(stream))),
            closed: AtomicBool::new(false),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn send_error(&self, e: std::io::Error) -> SinkError {
        SinkError::Send(format!("write to {}: {}", self.peer, e))
    }
}

#[async_trait]
impl SinkConnection for TcpSinkConnection {
    fn sink_name(&self) -> &str {
        "tcp"
    }

    async fn send(&self, record: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| SinkError::Send(format!("connection to {} is closed", self.peer)))?;

        writer.write_all(record).await.map_err(|e| self.send_error(e))?;
        writer.write_all(b"\n").await.map_err(|e| self.send_error(e))?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(writer) => writer.flush().await.map_err(|e| self.send_error(e)),
            None => Err(SinkError::Send(format!("connection to {} is closed", self.peer))),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            writer.flush().await?;
            writer.shutdown().await?;
            tracing::debug!(peer = %self.peer, "closed tcp sink connection");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Peek the socket without blocking. EOF or a socket error means the
    /// server has gone away and anything written now would be lost.
    fn is_alive(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        // Locked means a send is in flight on this connection.
        let Ok(guard) = self.writer.try_lock() else {
            return true;
        };
        let Some(writer) = guard.as_ref() else {
            return false;
        };

        let mut byte = [0u8; 1];
        let mut buf = ReadBuf::new(&mut byte);
        let mut cx = Context::from_waker(Waker::noop());
        match writer.get_ref().poll_peek(&mut cx, &mut buf) {
            Poll::Pending | Poll::Ready(Ok(1..)) => true,
            Poll::Ready(Ok(0)) => {
                tracing::debug!(peer = %self.peer, "tcp sink peer closed the connection");
                false
            }
            Poll::Ready(Err(e)) => {
                tracing::debug!(peer = %self.peer, error = %e, "tcp sink connection failed");
                false
            }
        }
    }
}
