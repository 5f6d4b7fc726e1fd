//! Common types for the Crossview environment abstraction.

use serde::{Deserialize, Serialize};

/// Envelope for one server message travelling over a snapshot feed.
///
/// This is a transport-layer wrapper - the payload is the raw JSON text
/// that the engine parses at its ingestion boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedFrame {
    /// Raw message text (JSON)
    pub payload: String,

    /// Monotonic sequence number assigned by the sender
    pub sequence: u64,

    /// Timestamp when the frame was sent (sender's clock, ms)
    pub sent_at_ms: u64,
}

impl FeedFrame {
    /// Creates a new frame from payload text.
    pub fn new(payload: impl Into<String>, sequence: u64, sent_at_ms: u64) -> Self {
        Self {
            payload: payload.into(),
            sequence,
            sent_at_ms,
        }
    }

    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_frame_size() {
        let frame = FeedFrame::new("{\"reset\":true}", 7, 1_000);
        assert_eq!(frame.size(), 14);
        assert_eq!(frame.sequence, 7);
    }
}
