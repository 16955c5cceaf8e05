//! `tokio_util::codec` adapter for PCIC framing.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_command, Frame, DEFAULT_MAX_PAYLOAD};
use crate::error::FrameError;

/// Decodes and encodes PCIC frames on a tokio `Framed` stream.
#[derive(Debug, Clone)]
pub struct PcicCodec {
    max_payload_size: usize,
}

impl PcicCodec {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl Default for PcicCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PcicCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        decode_frame(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Frame> for PcicCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        if item.body.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.body.len(),
                max: self.max_payload_size,
            });
        }
        encode_command(item.ticket, &item.body, dst)
    }
}
