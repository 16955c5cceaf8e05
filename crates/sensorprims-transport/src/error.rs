use std::time::Duration;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The address could not be resolved to any socket address.
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        source: std::io::Error,
    },

    /// The remote end actively refused the connection.
    #[error("connection refused by {addr}")]
    ConnectionRefused { addr: String },

    /// Connecting or a blocking I/O operation exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Failed to connect for any other reason.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The remote end closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this error is a timeout, as opposed to refusal or closure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
