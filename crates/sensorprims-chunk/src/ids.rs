//! Id list preceding the chunk region of an image stream answer.
//!
//! The image output schema produces `star;<id>;<id>;...;stop` in ASCII,
//! immediately followed by the binary chunks.

use crate::error::{ChunkError, Result};

const START_MARKER: &[u8] = b"star";
const STOP_MARKER: &[u8] = b"stop";
const DELIMITER: char = ';';

/// Split an image stream answer into its id list and its chunk region.
pub fn split_id_and_chunk_region(answer: &[u8]) -> Result<(Vec<String>, &[u8])> {
    if !answer.starts_with(START_MARKER) {
        return Err(ChunkError::MissingStartMarker);
    }

    let stop = answer
        .windows(STOP_MARKER.len())
        .position(|window| window == STOP_MARKER)
        .ok_or(ChunkError::MissingStopMarker)?;

    let ids = String::from_utf8_lossy(&answer[START_MARKER.len()..stop])
        .split(DELIMITER)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect();

    Ok((ids, &answer[stop + STOP_MARKER.len()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_region_split_at_stop() {
        let answer = b"star;2;4;stop\x01\x02\x03";
        let (ids, region) = split_id_and_chunk_region(answer).unwrap();
        assert_eq!(ids, vec!["2", "4"]);
        assert_eq!(region, b"\x01\x02\x03");
    }

    #[test]
    fn no_ids_is_empty_list() {
        let (ids, region) = split_id_and_chunk_region(b"star;stop").unwrap();
        assert!(ids.is_empty());
        assert!(region.is_empty());
    }

    #[test]
    fn stop_inside_binary_region_uses_first_marker() {
        let answer = b"star;1;stopxxstopyy";
        let (ids, region) = split_id_and_chunk_region(answer).unwrap();
        assert_eq!(ids, vec!["1"]);
        assert_eq!(region, b"xxstopyy");
    }

    #[test]
    fn missing_stop_is_an_error() {
        let err = split_id_and_chunk_region(b"star;1;2;").unwrap_err();
        assert!(matches!(err, ChunkError::MissingStopMarker));
    }

    #[test]
    fn missing_start_is_an_error() {
        let err = split_id_and_chunk_region(b"1;2;stop").unwrap_err();
        assert!(matches!(err, ChunkError::MissingStartMarker));
    }
}
