/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The 16-byte frame header (or the echoed ticket/CRLF around the body)
    /// does not follow the `<ticket>L<length>\r\n` layout.
    #[error("invalid frame header: {0}")]
    InvalidHeader(String),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// A blocking read or write hit the socket timeout.
    #[error("frame I/O timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, FrameError>;
