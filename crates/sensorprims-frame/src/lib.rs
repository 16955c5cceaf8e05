//! PCIC message framing for vision sensor result streams.
//!
//! Every message on the wire is framed as:
//! - a 4-digit ASCII ticket
//! - the literal `L` and a 9-digit decimal length of what follows the header
//! - CRLF, then the ticket repeated, the body, and a trailing CRLF
//!
//! Callers see [`Frame`]s with the echoed ticket and trailing CRLF already
//! stripped. No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod ticket;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::PcicCodec;
pub use codec::{
    decode_frame, decode_frame_header, encode_command, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD,
    HEADER_SIZE, MAX_DECLARED_LENGTH,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use ticket::Ticket;
pub use writer::FrameWriter;
