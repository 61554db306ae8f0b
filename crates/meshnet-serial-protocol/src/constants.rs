//! Protocol constants
//!
//! Marker bytes and size limits of the master/host serial framing.

// ============================================================================
// Markers
// ============================================================================

/// Preamble byte; every frame starts with two of these.
pub const PREAMBLE: u8 = 0xAF;
/// Start-of-frame marker following the preamble.
pub const START_MARKER: u8 = 0x02;
/// End-of-frame marker, the last byte of the body.
pub const END_MARKER: u8 = 0x03;

// ============================================================================
// Sizes
// ============================================================================

/// Bytes of frame content before the payload: destination/source node (2) + type (1).
pub const CONTENT_HEADER_LEN: usize = 3;
/// Largest content length that fits the one-byte length field.
pub const MAX_CONTENT_LEN: usize = u8::MAX as usize;
/// Largest payload a single frame can carry.
pub const MAX_FRAME_PAYLOAD: usize = MAX_CONTENT_LEN - CONTENT_HEADER_LEN;
/// Framing bytes around the content: preamble (2) + start (1) + length (1) + end (1).
pub const FRAME_OVERHEAD: usize = 5;
/// Largest complete frame on the wire.
pub const MAX_FRAMED_SIZE: usize = MAX_CONTENT_LEN + FRAME_OVERHEAD;
