//! Line framing for the renderer channel.
//!
//! Each frame is `<MARKER><json>\n`. Output arrives in chunks of arbitrary
//! size, so [`FrameCodec`] keeps the unterminated tail of the last chunk and
//! only interprets a line once its newline has been seen.

use crate::protocol::MARKER;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Upper bound on how many glued-together frames one line may be split into.
pub const MAX_MERGED_FRAMES: usize = 64;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result of interpreting one complete line.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<M> {
    /// A well-formed protocol frame.
    Message(M),
    /// Valid JSON behind the marker that matches no known message.
    Unrecognized(Value),
    /// Output that is not a protocol frame.
    Text(String),
}

/// Stateful encoder/decoder for one channel.
#[derive(Debug)]
pub struct FrameCodec {
    marker: String,
    tail: Vec<u8>,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_marker(MARKER)
    }

    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            tail: Vec::new(),
        }
    }

    /// Encode one message as a complete line, newline included.
    pub fn encode<M: Serialize>(&self, message: &M) -> Result<String, CodecError> {
        let json = serde_json::to_string(message)?;
        Ok(format!("{}{json}\n", self.marker))
    }

    /// Feed a chunk of output and collect every line it completes.
    pub fn decode<M: DeserializeOwned>(&mut self, chunk: &[u8]) -> Vec<Decoded<M>> {
        let mut decoded = Vec::new();
        let mut pieces = chunk.split(|byte| *byte == b'\n');

        if let Some(first) = pieces.next() {
            self.tail.extend_from_slice(first);
        }
        for piece in pieces {
            let line = std::mem::replace(&mut self.tail, piece.to_vec());
            let text = String::from_utf8_lossy(&line);
            self.interpret(text.trim(), 0, &mut decoded);
        }

        decoded
    }

    /// Bytes received after the last newline.
    pub fn pending(&self) -> &[u8] {
        &self.tail
    }

    fn interpret<M: DeserializeOwned>(&self, line: &str, merged: usize, out: &mut Vec<Decoded<M>>) {
        if line.is_empty() {
            return;
        }
        let Some(body) = line.strip_prefix(self.marker.as_str()) else {
            out.push(Decoded::Text(line.to_string()));
            return;
        };

        // Parse only the leading value so a marker inside a JSON string is
        // never mistaken for the start of the next frame.
        let mut values = serde_json::Deserializer::from_str(body).into_iter::<Value>();
        let rest = match values.next() {
            Some(Ok(value)) => {
                out.push(match M::deserialize(&value) {
                    Ok(message) => Decoded::Message(message),
                    Err(_) => Decoded::Unrecognized(value),
                });
                let rest = body[values.byte_offset()..].trim();
                if rest.is_empty() {
                    return;
                }
                if !rest.starts_with(self.marker.as_str()) {
                    tracing::warn!(trailing = %rest, "Unexpected text after frame, dropping it");
                    return;
                }
                rest
            }
            Some(Err(err)) => match body.find(self.marker.as_str()) {
                // A broken frame glued to a good one: skip to the next marker.
                Some(offset) => {
                    tracing::warn!(error = %err, line = %line, "Failed to parse merged frame, skipping it");
                    &body[offset..]
                }
                None => {
                    tracing::warn!(error = %err, line = %line, "Failed to parse frame, dropping line");
                    return;
                }
            },
            None => {
                tracing::warn!(line = %line, "Empty frame, dropping line");
                return;
            }
        };

        // Two frames written without a newline between them.
        if merged + 1 >= MAX_MERGED_FRAMES {
            tracing::warn!(frames = merged + 1, "Too many merged frames on one line, dropping rest");
            return;
        }
        self.interpret(rest, merged + 1, out);
    }
}
