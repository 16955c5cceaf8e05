use sensorprims_frame::Ticket;

use crate::response::ResponseCode;

/// Errors that can occur on a PCIC link.
#[derive(Debug, thiserror::Error)]
pub enum PcicError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sensorprims_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] sensorprims_frame::FrameError),

    /// Result chunk decoding error.
    #[error("chunk error: {0}")]
    Chunk(#[from] sensorprims_chunk::ChunkError),

    /// The device answered with a status code other than `*`.
    #[error("device refused command ({code}){}", reason_suffix(.reason))]
    DeviceRefused {
        code: ResponseCode,
        reason: Option<String>,
    },

    /// A trigger was refused while the device was busy evaluating.
    #[error("device busy{}", reason_suffix(.reason))]
    DeviceBusy { reason: Option<String> },

    /// A trigger was refused because of the device configuration.
    #[error("device in invalid state for trigger: {message} ({code})")]
    InvalidState { code: u32, message: String },

    /// A blocking read or write timed out; the link was torn down.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The device closed the connection.
    #[error("device disconnected: {0}")]
    Disconnected(String),

    /// The link has no open connection.
    #[error("link is not connected")]
    NotConnected,

    /// A previous call on `ticket` never completed; its reply may still arrive.
    #[error("ticket {ticket} still has a call in flight")]
    Desynchronized { ticket: Ticket },

    /// Too many unsolicited frames queued while waiting for a reply.
    #[error("async frame queue full ({0} frames)")]
    BufferFull(usize),

    /// The device answered with something the command does not produce.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// An argument is outside the range the command accepts.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {reason}"),
        None => String::new(),
    }
}

impl PcicError {
    /// Errors after which the connection can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Frame(_)
                | Self::Timeout(_)
                | Self::Disconnected(_)
                | Self::Desynchronized { .. }
                | Self::BufferFull(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PcicError>;
