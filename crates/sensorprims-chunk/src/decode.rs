use bytes::Bytes;
use image::{DynamicImage, GrayImage, ImageFormat};

use crate::error::{ChunkError, Result};
use crate::header::{ChunkHeader, ChunkType, META_DATA_OFFSET, SUPPORTED_HEADER_VERSION};

/// Typed payload of a result chunk.
#[derive(Debug, Clone)]
pub enum ChunkPayload {
    /// JPEG chunk: the encoded bytes and the decoded image.
    Jpeg {
        encoded: Bytes,
        image: DynamicImage,
    },
    /// Raw 8-bit monochrome chunk reshaped to `height x width`.
    Monochrome(GrayImage),
    /// Chunk type this crate does not interpret.
    Opaque(Bytes),
}

/// One decoded chunk: header, raw metadata region and typed payload.
#[derive(Debug, Clone)]
pub struct ResultChunk {
    pub header: ChunkHeader,
    meta: Bytes,
    pub payload: ChunkPayload,
}

impl ResultChunk {
    /// Parse the metadata JSON embedded in the header.
    ///
    /// Returns `Ok(None)` when the metadata region is empty.
    pub fn metadata(&self) -> Result<Option<serde_json::Value>> {
        let end = self
            .meta
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.meta.len());
        if end == 0 {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&self.meta[..end])?))
    }

    /// Raw metadata region, NUL padding included.
    pub fn raw_metadata(&self) -> &[u8] {
        &self.meta
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.header.chunk_type
    }

    /// Payload bytes as they arrived on the wire.
    pub fn payload_bytes(&self) -> &[u8] {
        match &self.payload {
            ChunkPayload::Jpeg { encoded, .. } => encoded,
            ChunkPayload::Monochrome(image) => image.as_raw(),
            ChunkPayload::Opaque(bytes) => bytes,
        }
    }
}

/// Decode every chunk in `buffer`.
///
/// The chunk sizes must add up to the buffer length exactly. A chunk whose
/// declared size overruns the buffer fails the whole decode.
pub fn decode_chunks(buffer: &[u8]) -> Result<Vec<ResultChunk>> {
    decode_chunks_bytes(Bytes::copy_from_slice(buffer))
}

/// Same as [`decode_chunks`] but slices payloads out of `buffer` without copying.
pub fn decode_chunks_bytes(buffer: Bytes) -> Result<Vec<ResultChunk>> {
    let mut chunks = Vec::new();
    let mut offset = 0usize;

    while offset < buffer.len() {
        let remaining = buffer.len() - offset;
        let header =
            ChunkHeader::parse(&buffer[offset..]).map_err(|err| err.at_offset(offset))?;

        let chunk_size = header.chunk_size as usize;
        if chunk_size > remaining {
            return Err(ChunkError::malformed(
                offset,
                format!("chunk_size {chunk_size} overruns the {remaining} remaining bytes"),
            ));
        }

        if header.header_version != SUPPORTED_HEADER_VERSION {
            tracing::warn!(
                offset,
                version = header.header_version,
                "unexpected chunk header version"
            );
        }

        let chunk = buffer.slice(offset..offset + chunk_size);
        chunks.push(decode_one(header, chunk, offset)?);
        offset += chunk_size;
    }

    tracing::debug!(chunks = chunks.len(), bytes = buffer.len(), "decoded result chunks");
    Ok(chunks)
}

fn decode_one(header: ChunkHeader, chunk: Bytes, offset: usize) -> Result<ResultChunk> {
    let header_size = header.header_size as usize;
    let meta = chunk.slice(META_DATA_OFFSET..header_size);
    let data = chunk.slice(header_size..);

    let payload = match header.chunk_type {
        ChunkType::Jpeg => {
            let image = image::load_from_memory_with_format(&data, ImageFormat::Jpeg)?;
            ChunkPayload::Jpeg {
                encoded: data,
                image,
            }
        }
        ChunkType::Monochrome8 => {
            let expected = header.image_width as usize * header.image_height as usize;
            if data.len() != expected {
                return Err(ChunkError::malformed(
                    offset,
                    format!(
                        "monochrome payload is {} bytes, {}x{} needs {expected}",
                        data.len(),
                        header.image_width,
                        header.image_height
                    ),
                ));
            }
            let image = GrayImage::from_raw(header.image_width, header.image_height, data.to_vec())
                .ok_or_else(|| ChunkError::malformed(offset, "monochrome payload size mismatch"))?;
            ChunkPayload::Monochrome(image)
        }
        ChunkType::Other(raw) => {
            tracing::warn!(offset, chunk_type = raw, "unknown chunk type, keeping raw bytes");
            ChunkPayload::Opaque(data)
        }
    };

    Ok(ResultChunk {
        header,
        meta,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::Luma;

    use super::*;

    const HEADER_SIZE: u32 = 0x40;

    fn chunk(chunk_type: ChunkType, width: u32, height: u32, meta: &[u8], data: &[u8]) -> Vec<u8> {
        let header = ChunkHeader {
            chunk_type,
            chunk_size: HEADER_SIZE + data.len() as u32,
            header_size: HEADER_SIZE,
            header_version: 3,
            image_width: width,
            image_height: height,
            pixel_format: 0,
            timestamp_us: 0,
            frame_count: 1,
            status_code: 0,
            timestamp_sec: 0,
            timestamp_nsec: 0,
        };
        let mut out = Vec::new();
        header.write_to(meta, &mut out);
        out.extend_from_slice(data);
        out
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let gray = GrayImage::from_fn(width, height, |x, y| Luma([((x + y) * 16) as u8]));
        let mut encoded = Vec::new();
        DynamicImage::ImageLuma8(gray)
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg)
            .unwrap();
        encoded
    }

    #[test]
    fn empty_buffer_yields_no_chunks() {
        assert!(decode_chunks(&[]).unwrap().is_empty());
    }

    #[test]
    fn chunks_returned_in_order_and_fully_consumed() {
        let mut buffer = Vec::new();
        buffer.extend(chunk(ChunkType::Other(900), 0, 0, b"", b"first"));
        buffer.extend(chunk(ChunkType::Monochrome8, 2, 2, b"", &[1, 2, 3, 4]));
        buffer.extend(chunk(ChunkType::Other(901), 0, 0, b"", b"third!"));

        let chunks = decode_chunks(&buffer).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chunk_type(), ChunkType::Other(900));
        assert_eq!(chunks[1].chunk_type(), ChunkType::Monochrome8);
        assert_eq!(chunks[2].chunk_type(), ChunkType::Other(901));

        let consumed: usize = chunks.iter().map(|c| c.header.chunk_size as usize).sum();
        assert_eq!(consumed, buffer.len());
        assert_eq!(chunks[2].payload_bytes(), b"third!");
    }

    #[test]
    fn jpeg_chunk_is_decoded() {
        let encoded = jpeg_bytes(16, 8);
        let buffer = chunk(ChunkType::Jpeg, 16, 8, b"", &encoded);

        let chunks = decode_chunks(&buffer).unwrap();
        match &chunks[0].payload {
            ChunkPayload::Jpeg { encoded: raw, image } => {
                assert_eq!(raw.as_ref(), encoded.as_slice());
                assert_eq!((image.width(), image.height()), (16, 8));
            }
            other => panic!("expected jpeg payload, got {other:?}"),
        }
    }

    #[test]
    fn monochrome_chunk_is_reshaped() {
        let pixels: Vec<u8> = (0..12).collect();
        let buffer = chunk(ChunkType::Monochrome8, 4, 3, b"", &pixels);

        let chunks = decode_chunks(&buffer).unwrap();
        let ChunkPayload::Monochrome(image) = &chunks[0].payload else {
            panic!("expected monochrome payload");
        };
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(1, 2).0, [9]);
    }

    #[test]
    fn monochrome_size_mismatch_is_malformed() {
        let buffer = chunk(ChunkType::Monochrome8, 4, 4, b"", &[0u8; 10]);
        let err = decode_chunks(&buffer).unwrap_err();
        assert!(matches!(err, ChunkError::MalformedChunk { offset: 0, .. }));
    }

    #[test]
    fn overrunning_last_chunk_consumes_nothing() {
        let mut buffer = chunk(ChunkType::Other(1), 0, 0, b"", b"ok");
        let first_len = buffer.len();
        let mut truncated = chunk(ChunkType::Other(2), 0, 0, b"", &[7u8; 32]);
        truncated.truncate(HEADER_SIZE as usize + 10);
        buffer.extend(truncated);

        let err = decode_chunks(&buffer).unwrap_err();
        match err {
            ChunkError::MalformedChunk { offset, reason } => {
                assert_eq!(offset, first_len);
                assert!(reason.contains("overruns"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_chunk_size_is_malformed_not_a_hang() {
        let mut buffer = chunk(ChunkType::Other(1), 0, 0, b"", b"");
        buffer[4..8].copy_from_slice(&0u32.to_le_bytes());
        let err = decode_chunks(&buffer).unwrap_err();
        assert!(matches!(err, ChunkError::MalformedChunk { .. }));
    }

    #[test]
    fn trailing_fragment_is_malformed() {
        let mut buffer = chunk(ChunkType::Other(1), 0, 0, b"", b"ok");
        let first_len = buffer.len();
        buffer.extend_from_slice(&[0u8; 12]);

        let err = decode_chunks(&buffer).unwrap_err();
        assert!(matches!(err, ChunkError::MalformedChunk { offset, .. } if offset == first_len));
    }

    #[test]
    fn metadata_parsed_from_header() {
        let buffer = chunk(ChunkType::Other(5), 0, 0, br#"{"model":"O2D"}"#, b"");
        let chunks = decode_chunks(&buffer).unwrap();
        let meta = chunks[0].metadata().unwrap().unwrap();
        assert_eq!(meta["model"], "O2D");
    }

    #[test]
    fn empty_metadata_is_none() {
        let buffer = chunk(ChunkType::Other(5), 0, 0, b"", b"");
        let chunks = decode_chunks(&buffer).unwrap();
        assert!(chunks[0].metadata().unwrap().is_none());
        assert_eq!(chunks[0].raw_metadata().len(), (HEADER_SIZE as usize) - META_DATA_OFFSET);
    }

    #[test]
    fn broken_metadata_is_reported() {
        let buffer = chunk(ChunkType::Other(5), 0, 0, b"{not json", b"");
        let chunks = decode_chunks(&buffer).unwrap();
        assert!(matches!(chunks[0].metadata(), Err(ChunkError::Metadata(_))));
    }

    #[test]
    fn invalid_jpeg_surfaces_image_error() {
        let buffer = chunk(ChunkType::Jpeg, 1, 1, b"", b"not a jpeg");
        assert!(matches!(decode_chunks(&buffer), Err(ChunkError::Image(_))));
    }
}
