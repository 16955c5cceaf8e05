//! One-character status replies.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

/// Status character a device sends instead of data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum ResponseCode {
    /// `*`: command executed.
    Success,
    /// `!`: invalid argument, invalid state or device busy.
    Refused,
    /// `?`: invalid command length or syntax.
    InvalidLength,
    /// `$`: error code unknown (error-state query only).
    Unknown,
}

impl ResponseCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'*' => Some(Self::Success),
            b'!' => Some(Self::Refused),
            b'?' => Some(Self::InvalidLength),
            b'$' => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Success => '*',
            Self::Refused => '!',
            Self::InvalidLength => '?',
            Self::Unknown => '$',
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl fmt::Debug for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResponseCode('{}')", self.as_char())
    }
}

impl From<ResponseCode> for String {
    fn from(code: ResponseCode) -> Self {
        code.as_char().to_string()
    }
}

/// A reply body, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Status(ResponseCode),
    Data(Bytes),
}

impl Reply {
    /// A single status character is a status; everything else is data.
    pub fn classify(body: &Bytes) -> Self {
        match body.as_ref() {
            [byte] => match ResponseCode::from_byte(*byte) {
                Some(code) => Self::Status(code),
                None => Self::Data(body.clone()),
            },
            _ => Self::Data(body.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bytes_classify() {
        for (byte, code) in [
            (b'*', ResponseCode::Success),
            (b'!', ResponseCode::Refused),
            (b'?', ResponseCode::InvalidLength),
            (b'$', ResponseCode::Unknown),
        ] {
            let body = Bytes::copy_from_slice(&[byte]);
            assert_eq!(Reply::classify(&body), Reply::Status(code));
            assert_eq!(code.as_char() as u8, byte);
        }
    }

    #[test]
    fn data_classifies_as_data() {
        let body = Bytes::from_static(b"03 03 03");
        assert_eq!(Reply::classify(&body), Reply::Data(body.clone()));

        let single = Bytes::from_static(b"7");
        assert_eq!(Reply::classify(&single), Reply::Data(single.clone()));

        let empty = Bytes::new();
        assert_eq!(Reply::classify(&empty), Reply::Data(empty.clone()));
    }

    #[test]
    fn code_serializes_as_char() {
        let json = serde_json::to_string(&ResponseCode::Refused).unwrap();
        assert_eq!(json, "\"!\"");
    }
}
