//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when encoding or decoding serial frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame content is too short to hold a node id and message type.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Frame content does not fit the one-byte length field.
    #[error("frame too long: maximum {max} bytes, got {actual}")]
    FrameTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length.
        actual: usize,
    },

    /// The byte after the preamble was not the start marker.
    #[error("bad start marker: 0x{0:02X}")]
    BadStartMarker(u8),

    /// The last body byte was not the end marker.
    #[error("missing end marker: got 0x{0:02X}")]
    MissingEndMarker(u8),
}

impl FrameError {
    /// Short label used for the `reason` metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            FrameError::FrameTooShort { .. } => "too_short",
            FrameError::FrameTooLong { .. } => "too_long",
            FrameError::BadStartMarker(_) => "bad_start",
            FrameError::MissingEndMarker(_) => "missing_end",
        }
    }
}
