//! Error types for sinkpool

use thiserror::Error;

/// Core error type for sink and pool operations
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Connection creation error: {0}")]
    ConnectionCreation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Send error: {0}")]
    Send(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl SinkError {
    /// Whether a caller may reasonably retry the operation that produced this error.
    ///
    /// `InvalidState` and `PoolClosed` point at caller bugs or a finished
    /// lifecycle, so they are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SinkError::ConnectionCreation(_)
                | SinkError::Send(_)
                | SinkError::Io(_)
                | SinkError::Timeout(_)
        )
    }

    /// Wrap an arbitrary error as a connection creation failure.
    ///
    /// Errors that already are `ConnectionCreation` pass through unchanged.
    pub fn into_creation_error(self) -> Self {
        match self {
            err @ SinkError::ConnectionCreation(_) => err,
            other => SinkError::ConnectionCreation(other.to_string()),
        }
    }
}

/// Result type alias for sinkpool operations
pub type Result<T> = std::result::Result<T, SinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SinkError::ConnectionCreation("refused".into()).is_transient());
        assert!(SinkError::Send("broken pipe".into()).is_transient());
        assert!(SinkError::Timeout("acquire".into()).is_transient());
        assert!(
            SinkError::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
                .is_transient()
        );

        assert!(!SinkError::PoolClosed.is_transient());
        assert!(!SinkError::InvalidState("foreign".into()).is_transient());
        assert!(!SinkError::Configuration("bad".into()).is_transient());
    }

    #[test]
    fn test_into_creation_error() {
        let err = SinkError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ))
        .into_creation_error();
        match err {
            SinkError::ConnectionCreation(msg) => assert!(msg.contains("connection refused")),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = SinkError::ConnectionCreation("dns".into()).into_creation_error();
        assert_eq!(err.to_string(), "Connection creation error: dns");
    }

    #[test]
    fn test_display() {
        assert_eq!(SinkError::PoolClosed.to_string(), "Pool is closed");
        assert_eq!(
            SinkError::InvalidState("not checked out".into()).to_string(),
            "Invalid state: not checked out"
        );
    }
}
