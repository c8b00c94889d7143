//! Ticker Batch Codec
//!
//! Decodes one frame of the ticker stream into raw entries. A frame either
//! decodes as a whole or is rejected as a whole; per-entry numeric
//! validation happens later, when records are built.

use std::str::Utf8Error;

use super::messages::TickerMessage;
use crate::application::ports::{BatchDecoder, MalformedBatchError};
use crate::domain::quote::TickerEntry;

impl From<serde_json::Error> for MalformedBatchError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string(), e.line(), e.column())
    }
}

/// JSON codec for the ticker array stream.
#[derive(Debug, Default, Clone)]
pub struct TickerCodec;

impl TickerCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a frame into entries, preserving order.
    ///
    /// The frame must be UTF-8 JSON; text and binary frames are treated
    /// alike.
    ///
    /// # Errors
    ///
    /// Returns `MalformedBatchError` if the frame is not valid UTF-8, not a
    /// JSON array, or any element lacks the symbol, price or percent change
    /// fields.
    pub fn decode(&self, payload: &[u8]) -> Result<Vec<TickerEntry>, MalformedBatchError> {
        // serde_json skips ignored strings without checking their UTF-8
        let text = std::str::from_utf8(payload).map_err(|e| invalid_utf8(payload, &e))?;
        let messages: Vec<TickerMessage> = serde_json::from_str(text)?;
        Ok(messages.into_iter().map(TickerEntry::from).collect())
    }
}

fn invalid_utf8(payload: &[u8], e: &Utf8Error) -> MalformedBatchError {
    let valid = &payload[..e.valid_up_to()];
    let line = valid.split(|&b| b == b'\n').count();
    let column = valid.rsplit(|&b| b == b'\n').next().map_or(0, <[u8]>::len) + 1;
    MalformedBatchError::new(e.to_string(), line, column)
}

impl BatchDecoder for TickerCodec {
    fn decode(&self, payload: &[u8]) -> Result<Vec<TickerEntry>, MalformedBatchError> {
        Self::decode(self, payload)
    }
}
