//! Chunk decoding
//!
//! Each read from the response stream is expected to carry exactly one JSON
//! envelope `{"event"?: string, "data": "<json-encoded payload>"}`. There is no
//! reassembly buffer: an envelope split across two reads surfaces as a
//! [`Error::MalformedChunk`] and the caller's policy decides what to do with it.

use serde::Deserialize;
use tracing::trace;

use crate::error::{Error, Result};
use crate::event::{EventKind, EventPayload, MetadataMap, StreamEvent};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    event: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataObject {
    #[serde(flatten)]
    payload: EventPayload,
    #[serde(default)]
    metadata_map: Option<MetadataMap>,
}

/// Turns raw text chunks into [`StreamEvent`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkDecoder;

impl ChunkDecoder {
    /// Create a decoder
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode one chunk into zero or one event
    pub fn decode(&self, chunk: &str) -> Result<Option<StreamEvent>> {
        let text = chunk.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| Error::malformed(chunk, e.to_string()))?;
        let data: DataObject = serde_json::from_str(&envelope.data)
            .map_err(|e| Error::malformed(chunk, format!("invalid data field: {}", e)))?;

        let kind = envelope
            .event
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(EventKind::from)
            .unwrap_or(EventKind::Content);

        trace!(kind = %kind, "Decoded chunk");

        Ok(Some(StreamEvent {
            kind,
            payload: data.payload,
            metadata: data.metadata_map.unwrap_or_default(),
        }))
    }
}

/// Incremental UTF-8 decoding of a byte stream
///
/// Holds back an incomplete trailing code point until the next read supplies
/// the rest of it. Invalid sequences are replaced with U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    /// Create a decoder with no pending bytes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next read
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let keep = incomplete_tail_len(&self.pending);
        let split = self.pending.len() - keep;
        let tail = self.pending.split_off(split);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = tail;
        text
    }

    /// Flush whatever is still pending at end of stream
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }

    /// Whether bytes are held back
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Length of a trailing, not yet complete, UTF-8 sequence
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    for i in (start..bytes.len()).rev() {
        let b = bytes[i];
        if b & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let needed = if b & 0b1110_0000 == 0b1100_0000 {
            2
        } else if b & 0b1111_0000 == 0b1110_0000 {
            3
        } else if b & 0b1111_1000 == 0b1111_0000 {
            4
        } else {
            return 0;
        };
        let have = bytes.len() - i;
        return if have < needed { have } else { 0 };
    }
    0
}
