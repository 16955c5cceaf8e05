use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::ticket::Ticket;

/// Frame header: ticket (4) + `L` (1) + length (9) + CRLF (2) = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Width of the decimal length field.
pub const LENGTH_DIGITS: usize = 9;

/// Largest length representable in the 9-digit field.
pub const MAX_DECLARED_LENGTH: usize = 999_999_999;

/// Echoed ticket (4) + trailing CRLF (2) wrapped around every body.
pub const ENVELOPE_OVERHEAD: usize = 6;

/// Default maximum declared length accepted from the wire: 64 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

const LENGTH_MARKER: u8 = b'L';
const CRLF: &[u8; 2] = b"\r\n";

/// A framed message with its ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The ticket this message belongs to.
    pub ticket: Ticket,
    /// The logical body, without the echoed ticket and trailing CRLF.
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(ticket: Ticket, body: impl Into<Bytes>) -> Self {
        Self {
            ticket,
            body: body.into(),
        }
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + ENVELOPE_OVERHEAD + self.body.len()
    }

    /// The body as UTF-8 text, if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Encode a command into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬─────┬──────────────┬──────┬──────────┬─────────┬──────┐
/// │ Ticket   │ 'L' │ Length       │ CRLF │ Ticket   │ Payload │ CRLF │
/// │ (4 ASCII)│     │ (9 digits)   │      │ (4 ASCII)│         │      │
/// └──────────┴─────┴──────────────┴──────┴──────────┴─────────┴──────┘
///                                  Length counts everything after the first CRLF.
/// ```
pub fn encode_command(ticket: Ticket, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let declared = payload.len() + ENVELOPE_OVERHEAD;
    if declared > MAX_DECLARED_LENGTH {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_DECLARED_LENGTH - ENVELOPE_OVERHEAD,
        });
    }
    dst.reserve(HEADER_SIZE + declared);
    dst.put_slice(ticket.as_bytes());
    dst.put_u8(LENGTH_MARKER);
    dst.put_slice(format!("{declared:0width$}", width = LENGTH_DIGITS).as_bytes());
    dst.put_slice(CRLF);
    dst.put_slice(ticket.as_bytes());
    dst.put_slice(payload);
    dst.put_slice(CRLF);
    Ok(())
}

/// Parse the fixed 16-byte preamble into `(ticket, declared_length)`.
///
/// The declared length counts the echoed ticket, the body and the trailing
/// CRLF.
pub fn decode_frame_header(header: &[u8; HEADER_SIZE]) -> Result<(Ticket, usize)> {
    let mut ticket = [0u8; 4];
    ticket.copy_from_slice(&header[0..4]);
    let ticket = Ticket::from_bytes(ticket)?;

    if header[4] != LENGTH_MARKER {
        return Err(FrameError::InvalidHeader(format!(
            "expected length marker 'L' at offset 4, got 0x{:02x}",
            header[4]
        )));
    }

    let digits = &header[5..5 + LENGTH_DIGITS];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::InvalidHeader(format!(
            "length field is not a decimal numeral: {:?}",
            String::from_utf8_lossy(digits)
        )));
    }
    let declared = digits
        .iter()
        .fold(0usize, |acc, digit| acc * 10 + usize::from(digit - b'0'));

    if &header[14..16] != CRLF {
        return Err(FrameError::InvalidHeader(
            "header is not terminated by CRLF".to_string(),
        ));
    }

    if declared < ENVELOPE_OVERHEAD {
        return Err(FrameError::InvalidHeader(format!(
            "declared length {declared} is shorter than the ticket echo and CRLF"
        )));
    }

    Ok((ticket, declared))
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&src[..HEADER_SIZE]);
    let (ticket, declared) = decode_frame_header(&header)?;

    if declared > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: declared,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + declared;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let envelope = src.split_to(declared).freeze();

    if envelope[..4] != ticket.as_bytes()[..] {
        return Err(FrameError::InvalidHeader(format!(
            "body does not repeat ticket {ticket}"
        )));
    }
    if &envelope[declared - 2..] != CRLF {
        return Err(FrameError::InvalidHeader(
            "body is not terminated by CRLF".to_string(),
        ));
    }

    let body = envelope.slice(4..declared - 2);
    Ok(Some(Frame { ticket, body }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum declared frame length in bytes. Default: 64 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
