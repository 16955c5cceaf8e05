//! Ticket numbers.
//!
//! A ticket correlates a command with its reply. Ticket `0000` is reserved for
//! unsolicited asynchronous output (results, errors, notifications).

use std::fmt;

use crate::error::{FrameError, Result};

/// A 4-digit ASCII ticket.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket([u8; 4]);

impl Ticket {
    /// Unsolicited asynchronous output.
    pub const ASYNC: Ticket = Ticket(*b"0000");

    /// Ticket used for synchronous commands issued by this client.
    pub const COMMAND: Ticket = Ticket(*b"1000");

    /// Build a ticket from its four wire bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Result<Self> {
        if !bytes.iter().all(u8::is_ascii_digit) {
            return Err(FrameError::InvalidHeader(format!(
                "ticket must be 4 ASCII digits, got {:?}",
                String::from_utf8_lossy(&bytes)
            )));
        }
        Ok(Self(bytes))
    }

    /// Build a ticket from a number in `0..=9999`.
    pub fn from_number(number: u16) -> Result<Self> {
        if number > 9999 {
            return Err(FrameError::InvalidHeader(format!(
                "ticket number {number} exceeds 4 digits"
            )));
        }
        let text = format!("{number:04}");
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(text.as_bytes());
        Ok(Self(bytes))
    }

    /// The four wire bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Returns true for the reserved asynchronous ticket `0000`.
    pub fn is_async(&self) -> bool {
        *self == Self::ASYNC
    }
}

impl std::str::FromStr for Ticket {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes: [u8; 4] = s.as_bytes().try_into().map_err(|_| {
            FrameError::InvalidHeader(format!("ticket must be 4 characters, got {s:?}"))
        })?;
        Self::from_bytes(bytes)
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Always ASCII digits by construction.
        f.write_str(std::str::from_utf8(&self.0).unwrap_or("????"))
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket({self})")
    }
}
