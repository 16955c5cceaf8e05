use std::fmt;
use std::io;

use sensorprims_frame::FrameError;
use sensorprims_pcic::PcicError;
use sensorprims_rpc::RpcError;
use sensorprims_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DEVICE_REFUSED: i32 = 40;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::Timeout => CliError::new(TIMEOUT, format!("{context}: {err}")),
        FrameError::InvalidHeader(_) | FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}

pub fn pcic_error(context: &str, err: PcicError) -> CliError {
    match err {
        PcicError::Transport(err) => transport_error(context, err),
        PcicError::Frame(err) => frame_error(context, err),
        PcicError::DeviceRefused { .. }
        | PcicError::DeviceBusy { .. }
        | PcicError::InvalidState { .. } => {
            CliError::new(DEVICE_REFUSED, format!("{context}: {err}"))
        }
        PcicError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        PcicError::Disconnected(_) | PcicError::NotConnected => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        PcicError::Chunk(_) | PcicError::UnexpectedResponse(_) | PcicError::Json(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        PcicError::InvalidArgument(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn rpc_error(context: &str, err: RpcError) -> CliError {
    match err {
        RpcError::Fault { .. } => CliError::new(DEVICE_REFUSED, format!("{context}: {err}")),
        RpcError::Http(_) | RpcError::ConnectionRefused(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        RpcError::Timeout(_) | RpcError::ProgressTimeout { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        RpcError::Xml(_)
        | RpcError::UnexpectedValue { .. }
        | RpcError::Json(_)
        | RpcError::Image(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        RpcError::NotFound(_) | RpcError::InvalidArgument(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        RpcError::Io(source) => io_error(context, source),
        RpcError::Teardown { cause, teardown } => {
            let message = format!("{context}: {cause}; teardown also failed: {teardown}");
            CliError::new(rpc_error(context, *cause).code, message)
        }
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}
