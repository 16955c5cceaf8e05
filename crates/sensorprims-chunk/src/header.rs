//! Chunk header layout.
//!
//! ```text
//! 0x00 chunk_type      0x04 chunk_size     0x08 header_size   0x0C header_version
//! 0x10 image_width     0x14 image_height   0x18 pixel_format  0x1C timestamp_us
//! 0x20 frame_count     0x24 status_code    0x28 timestamp_sec 0x2C timestamp_nsec
//! 0x30 meta_data (NUL-terminated JSON, runs up to header_size)
//! ```
//!
//! Every field is a little-endian 32-bit word.

use std::fmt;

use crate::error::{ChunkError, Result};

/// Offset of the metadata region.
pub const META_DATA_OFFSET: usize = 0x30;

/// Smallest header that still carries the first metadata word.
pub const MIN_HEADER_SIZE: usize = 0x34;

/// The header layout this crate was written against.
pub const SUPPORTED_HEADER_VERSION: u32 = 3;

/// Chunk type tag at offset 0x00.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkType {
    /// Raw 8-bit monochrome pixels, `image_width * image_height` bytes.
    Monochrome8,
    /// JPEG-encoded image.
    Jpeg,
    /// Any other tag; the payload is kept as opaque bytes.
    Other(u32),
}

impl ChunkType {
    pub const MONOCHROME_2D_8BIT: u32 = 251;
    pub const JPEG_IMAGE: u32 = 260;

    pub fn from_raw(raw: u32) -> Self {
        match raw {
            Self::MONOCHROME_2D_8BIT => Self::Monochrome8,
            Self::JPEG_IMAGE => Self::Jpeg,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            Self::Monochrome8 => Self::MONOCHROME_2D_8BIT,
            Self::Jpeg => Self::JPEG_IMAGE,
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monochrome8 => f.write_str("monochrome-8bit"),
            Self::Jpeg => f.write_str("jpeg"),
            Self::Other(raw) => write!(f, "unknown({raw})"),
        }
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkType({self})")
    }
}

/// Fixed header of a result chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_type: ChunkType,
    /// Total bytes of this chunk, header included.
    pub chunk_size: u32,
    /// Offset of the payload from the start of the chunk.
    pub header_size: u32,
    pub header_version: u32,
    pub image_width: u32,
    pub image_height: u32,
    /// Device pixel format code, passed through unchanged.
    pub pixel_format: u32,
    pub timestamp_us: u32,
    pub frame_count: u32,
    pub status_code: u32,
    pub timestamp_sec: u32,
    pub timestamp_nsec: u32,
}

impl ChunkHeader {
    /// Parse the header at the start of `bytes`.
    ///
    /// Offsets in returned errors are relative to `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_HEADER_SIZE {
            return Err(ChunkError::malformed(
                0,
                format!(
                    "{} bytes left, a chunk header needs at least {MIN_HEADER_SIZE}",
                    bytes.len()
                ),
            ));
        }

        let header = Self {
            chunk_type: ChunkType::from_raw(word(bytes, 0x00)),
            chunk_size: word(bytes, 0x04),
            header_size: word(bytes, 0x08),
            header_version: word(bytes, 0x0C),
            image_width: word(bytes, 0x10),
            image_height: word(bytes, 0x14),
            pixel_format: word(bytes, 0x18),
            timestamp_us: word(bytes, 0x1C),
            frame_count: word(bytes, 0x20),
            status_code: word(bytes, 0x24),
            timestamp_sec: word(bytes, 0x28),
            timestamp_nsec: word(bytes, 0x2C),
        };

        if header.chunk_size == 0 {
            return Err(ChunkError::malformed(0, "chunk_size is zero"));
        }
        if (header.header_size as usize) < MIN_HEADER_SIZE {
            return Err(ChunkError::malformed(
                0,
                format!(
                    "header_size {} is below the minimum of {MIN_HEADER_SIZE}",
                    header.header_size
                ),
            ));
        }
        if header.header_size > header.chunk_size {
            return Err(ChunkError::malformed(
                0,
                format!(
                    "header_size {} exceeds chunk_size {}",
                    header.header_size, header.chunk_size
                ),
            ));
        }

        Ok(header)
    }

    /// Encode this header into `dst`, padded with zeros up to `header_size`.
    ///
    /// Used to build result buffers for fake devices and tests.
    pub fn write_to(&self, metadata: &[u8], dst: &mut Vec<u8>) {
        let start = dst.len();
        for value in [
            self.chunk_type.as_raw(),
            self.chunk_size,
            self.header_size,
            self.header_version,
            self.image_width,
            self.image_height,
            self.pixel_format,
            self.timestamp_us,
            self.frame_count,
            self.status_code,
            self.timestamp_sec,
            self.timestamp_nsec,
        ] {
            dst.extend_from_slice(&value.to_le_bytes());
        }
        let room = (self.header_size as usize).saturating_sub(META_DATA_OFFSET);
        let meta = &metadata[..metadata.len().min(room)];
        dst.extend_from_slice(meta);
        dst.resize(start + self.header_size as usize, 0);
    }

    pub fn payload_len(&self) -> usize {
        self.chunk_size.saturating_sub(self.header_size) as usize
    }
}

fn word(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}
