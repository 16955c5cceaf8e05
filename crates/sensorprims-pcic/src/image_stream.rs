//! Continuous image output over a PCIC link.
//!
//! Replaces the connection's output schema with one that emits the image ids
//! followed by the image chunks, then yields one [`ImageFrame`] per result.

use std::time::Duration;

use sensorprims_chunk::{decode_chunks, split_id_and_chunk_region, ResultChunk};
use serde_json::json;

use crate::error::Result;
use crate::link::PcicLink;
use crate::model::OutputMode;

/// One result of the image stream.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    /// Image ids in output order, as configured in the application.
    pub ids: Vec<String>,
    pub chunks: Vec<ResultChunk>,
}

/// Output schema producing `star;<id>;...;stop<chunks>`.
pub fn image_output_schema() -> serde_json::Value {
    json!({
        "elements": [
            { "id": "start_string", "type": "string", "value": "star" },
            { "id": "delimiter", "type": "string", "value": ";" },
            {
                "id": "Images",
                "type": "records",
                "elements": [
                    { "id": "ID", "type": "uint8" },
                    { "id": "delimiter", "type": "string", "value": ";" }
                ]
            },
            { "id": "end_string", "type": "string", "value": "stop" },
            {
                "id": "Images",
                "type": "records",
                "elements": [
                    { "id": "jpeg_image", "type": "blob" },
                    { "id": "raw_image", "type": "blob" }
                ]
            }
        ],
        "format": { "dataencoding": "ascii" },
        "layouter": "flexible"
    })
}

pub struct ImageStream {
    link: PcicLink,
}

impl ImageStream {
    /// Switch `link` to image output.
    ///
    /// Output is disabled while the schema is replaced so no result in the
    /// old format is queued behind the switch.
    pub fn open(mut link: PcicLink) -> Result<Self> {
        link.set_output_mode(OutputMode::Disabled)?;
        link.upload_output_schema(&image_output_schema())?;
        link.set_output_mode(OutputMode::Results)?;
        tracing::debug!(addr = link.addr(), "image stream enabled");
        Ok(Self { link })
    }

    /// Wait for the next result (up to the link's I/O timeout).
    pub fn next_frame(&mut self) -> Result<ImageFrame> {
        let body = self.link.read_next_async()?;
        parse_frame(&body)
    }

    /// Wait for the next result with a one-off timeout; `None` waits forever.
    pub fn next_frame_timeout(&mut self, timeout: Option<Duration>) -> Result<ImageFrame> {
        let body = self.link.read_next_async_timeout(timeout)?;
        parse_frame(&body)
    }

    /// Wait up to `wait` for the next result; `Ok(None)` if the device stayed quiet.
    pub fn poll_frame(&mut self, wait: Duration) -> Result<Option<ImageFrame>> {
        match self.link.poll_next_async(wait)? {
            Some(body) => parse_frame(&body).map(Some),
            None => Ok(None),
        }
    }

    pub fn link(&mut self) -> &mut PcicLink {
        &mut self.link
    }

    pub fn into_inner(self) -> PcicLink {
        self.link
    }
}

impl Iterator for ImageStream {
    type Item = Result<ImageFrame>;

    /// Ends after the first error that closed the link.
    fn next(&mut self) -> Option<Self::Item> {
        if !self.link.is_connected() {
            return None;
        }
        Some(self.next_frame())
    }
}

fn parse_frame(body: &[u8]) -> Result<ImageFrame> {
    let (ids, region) = split_id_and_chunk_region(body)?;
    let chunks = decode_chunks(region)?;
    tracing::debug!(images = ids.len(), chunks = chunks.len(), "image frame received");
    Ok(ImageFrame { ids, chunks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_has_start_and_stop_markers() {
        let schema = image_output_schema();
        let elements = schema["elements"].as_array().expect("elements array");
        assert_eq!(elements[0]["value"], "star");
        assert_eq!(elements[3]["value"], "stop");
        assert_eq!(schema["layouter"], "flexible");
    }

    #[test]
    fn frame_without_chunks() {
        let frame = parse_frame(b"star;stop").expect("frame should parse");
        assert!(frame.ids.is_empty());
        assert!(frame.chunks.is_empty());
    }

    #[test]
    fn frame_without_stop_is_rejected() {
        assert!(parse_frame(b"star;1;").is_err());
    }
}
