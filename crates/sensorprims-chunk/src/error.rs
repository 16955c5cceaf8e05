/// Errors that can occur while decoding result chunks.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// A chunk header or size violates the chunk layout invariants.
    #[error("malformed chunk at offset {offset}: {reason}")]
    MalformedChunk { offset: usize, reason: String },

    /// The id list of an image stream answer has no `stop` marker.
    #[error("answer has no 'stop' marker after the id list")]
    MissingStopMarker,

    /// The id list of an image stream answer does not start with `star`.
    #[error("answer does not start with the 'star' marker")]
    MissingStartMarker,

    /// The image codec rejected a JPEG payload.
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    /// The chunk metadata is not a valid JSON object.
    #[error("chunk metadata is not valid JSON: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl ChunkError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedChunk {
            offset,
            reason: reason.into(),
        }
    }

    /// Shift a chunk-relative offset to a buffer-relative one.
    pub(crate) fn at_offset(self, base: usize) -> Self {
        match self {
            Self::MalformedChunk { offset, reason } => Self::MalformedChunk {
                offset: base + offset,
                reason,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChunkError>;
