//! Error types for meshnet-packet.

use thiserror::Error;

/// Errors that can occur during envelope operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// A read or write would move the cursor past the declared length.
    #[error("Envelope overrun at offset {offset}: need {needed} bytes, length is {len}")]
    Overrun {
        /// Cursor position when the access was attempted.
        offset: usize,
        /// Number of bytes the access needed.
        needed: usize,
        /// Declared logical length of the envelope.
        len: usize,
    },

    /// Received message is shorter than the smallest valid envelope.
    #[error("Envelope too short: {len} bytes (min {min})")]
    TooShort {
        /// Actual size.
        len: usize,
        /// Minimum allowed size.
        min: usize,
    },

    /// Received message does not fit the envelope buffer.
    #[error("Envelope too long: {len} bytes (max {max})")]
    TooLong {
        /// Actual size.
        len: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The length prefix disagrees with the number of bytes received.
    #[error("Length mismatch: prefix declares {declared} bytes, received {received}")]
    LengthMismatch {
        /// Total length implied by the length prefix.
        declared: usize,
        /// Number of bytes actually received.
        received: usize,
    },

    /// The authentication tag did not match.
    #[error("Authentication tag mismatch")]
    TagMismatch,

    /// Invalid message type.
    #[error("Invalid message type: {0}")]
    InvalidMessageType(u8),

    /// Invalid pre-shared key.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl PacketError {
    /// Create an overrun error.
    pub fn overrun(offset: usize, needed: usize, len: usize) -> Self {
        PacketError::Overrun {
            offset,
            needed,
            len,
        }
    }

    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        PacketError::InvalidKey(message.into())
    }

    /// Short label used for the `reason` metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            PacketError::Overrun { .. } => "overrun",
            PacketError::TooShort { .. } => "too_short",
            PacketError::TooLong { .. } => "too_long",
            PacketError::LengthMismatch { .. } => "length_mismatch",
            PacketError::TagMismatch => "tag_mismatch",
            PacketError::InvalidMessageType(_) => "invalid_type",
            PacketError::InvalidKey(_) => "invalid_key",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PacketError::overrun(10, 2, 11);
        assert!(err.to_string().contains("offset 10"));

        let err = PacketError::invalid_key("odd length");
        assert!(err.to_string().contains("odd length"));
    }

    #[test]
    fn test_error_reason() {
        assert_eq!(PacketError::TagMismatch.reason(), "tag_mismatch");
        assert_eq!(
            PacketError::TooShort { len: 3, min: 13 }.reason(),
            "too_short"
        );
    }
}
