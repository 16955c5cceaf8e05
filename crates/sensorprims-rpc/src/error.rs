use std::time::Duration;

/// Errors that can occur talking to the remote configuration endpoint.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The device answered with a fault.
    #[error("remote fault {code}: {message}")]
    Fault { code: i32, message: String },

    /// HTTP-level failure (bad status, broken connection).
    #[error("http error: {0}")]
    Http(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Nothing is listening at the endpoint.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// The response was not a valid XML-RPC document.
    #[error("malformed xml-rpc response: {0}")]
    Xml(String),

    /// The device returned a value of an unexpected type.
    #[error("unexpected value for {what}: {got}")]
    UnexpectedValue { what: String, got: String },

    /// The requested object does not exist on the device.
    #[error("not found: {0}")]
    NotFound(String),

    /// An application is already open for editing on this lease.
    #[error("already editing: {0}")]
    AlreadyEditing(String),

    /// A scope was used or closed while a nested scope was still open.
    #[error("scope ordering violation: {0}")]
    OrderingViolation(String),

    /// The lease was cancelled.
    #[error("session lease cancelled")]
    LeaseCancelled,

    /// The background heartbeat failed; the session may have expired.
    #[error("session heartbeat failed: {0}")]
    HeartbeatFailed(String),

    /// A progress poll did not reach completion in time.
    #[error("operation still at {progress:.2} after {elapsed:?}")]
    ProgressTimeout { elapsed: Duration, progress: f64 },

    /// A scope body failed and so did the teardown call that followed it.
    #[error("{cause}; teardown also failed: {teardown}")]
    Teardown {
        cause: Box<RpcError>,
        teardown: Box<RpcError>,
    },

    /// An argument was rejected before anything was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// Fault code, if this is a device fault.
    pub fn fault_code(&self) -> Option<i32> {
        match self {
            Self::Fault { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn unexpected(what: impl Into<String>, got: &xmlrpc::Value) -> Self {
        Self::UnexpectedValue {
            what: what.into(),
            got: format!("{got:?}"),
        }
    }
}

/// Report the body error, the teardown error, or both.
pub(crate) fn combine<T>(result: Result<T>, teardown: Result<()>) -> Result<T> {
    match (result, teardown) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(err), Ok(())) | (Ok(_), Err(err)) => Err(err),
        (Err(cause), Err(teardown)) => Err(RpcError::Teardown {
            cause: Box::new(cause),
            teardown: Box::new(teardown),
        }),
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
