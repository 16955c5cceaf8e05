//! Result chunk decoding for vision sensor PCIC output.
//!
//! Result payloads are a concatenation of binary chunks. Each chunk starts with
//! a little-endian header that states its type, its total size and where the
//! payload begins. [`decode_chunks`] walks a buffer chunk by chunk and hands
//! back typed [`ResultChunk`]s; [`split_id_and_chunk_region`] separates the
//! ASCII id list that precedes the chunks in an image stream.

pub mod decode;
pub mod error;
pub mod header;
pub mod ids;

pub use decode::{decode_chunks, decode_chunks_bytes, ChunkPayload, ResultChunk};
pub use error::{ChunkError, Result};
pub use header::{ChunkHeader, ChunkType, MIN_HEADER_SIZE, SUPPORTED_HEADER_VERSION};
pub use ids::split_id_and_chunk_region;
