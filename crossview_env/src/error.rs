//! Error types for the Crossview environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The feed channel was closed by the other side
    #[error("Feed closed: {0}")]
    FeedClosed(String),

    /// Frame was dropped by an injected fault (simulated loss or stall)
    #[error("Frame dropped: {0}")]
    FrameDropped(String),

    /// Payload serialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a closed-feed error.
    pub fn closed(msg: impl Into<String>) -> Self {
        Self::FeedClosed(msg.into())
    }

    /// Creates a dropped-frame error.
    pub fn dropped(reason: impl std::fmt::Display) -> Self {
        Self::FrameDropped(reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(EnvError::closed("router gone").to_string(), "Feed closed: router gone");
        assert_eq!(EnvError::dropped("loss").to_string(), "Frame dropped: loss");
        assert_eq!(EnvError::Timeout(250).to_string(), "Timeout after 250ms");
    }
}
