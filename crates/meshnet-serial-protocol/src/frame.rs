//! Frame encoding/decoding.
//!
//! Decoding is a byte-at-a-time state machine:
//!
//! ```text
//! Preamble --AF AF--> Start --02--> Length --len--> Body (len + 1 bytes, last = 03)
//! ```
//!
//! The preamble is matched on a sliding two-byte window, so it is found at any
//! alignment. When a candidate frame is rejected, every byte consumed after its
//! first preamble byte is scanned again, so a valid frame hidden behind a stray
//! preamble or behind a frame that declared too long a body is still recovered.
//! A rejected frame is never partially delivered.

use crate::{
    FrameError, CONTENT_HEADER_LEN, END_MARKER, MAX_CONTENT_LEN, MAX_FRAMED_SIZE, PREAMBLE,
    START_MARKER,
};
use bytes::{Buf, BufMut, BytesMut};
use meshnet_packet::{MessageType, NodeAddr, PacketError};

/// One decoded frame.
///
/// `node` is the destination for host-to-master frames and the source for
/// master-to-host frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialFrame {
    /// Node address.
    pub node: NodeAddr,
    /// Raw message type byte.
    pub msg_type: u8,
    /// Payload bytes (an envelope, for application traffic).
    pub payload: Vec<u8>,
}

impl SerialFrame {
    /// Create a frame.
    pub fn new(node: NodeAddr, msg_type: u8, payload: Vec<u8>) -> Self {
        SerialFrame {
            node,
            msg_type,
            payload,
        }
    }

    /// The message type, if it is one of the known types.
    pub fn message_type(&self) -> Result<MessageType, PacketError> {
        MessageType::try_from(self.msg_type)
    }

    /// Encode this frame for the wire.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode_frame(self.node, self.msg_type, &self.payload)
    }

    /// Parse frame content (`node`, `type`, `payload`), without markers.
    pub fn from_content(content: &[u8]) -> Result<Self, FrameError> {
        if content.len() < CONTENT_HEADER_LEN {
            return Err(FrameError::FrameTooShort {
                expected: CONTENT_HEADER_LEN,
                actual: content.len(),
            });
        }
        let mut content = content;
        let node = content.get_u16();
        let msg_type = content.get_u8();
        Ok(SerialFrame::new(node, msg_type, content.to_vec()))
    }
}

/// Encode a frame: `AF AF 02 len node type payload 03`.
pub fn encode_frame(node: NodeAddr, msg_type: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let content_len = CONTENT_HEADER_LEN + payload.len();
    if content_len > MAX_CONTENT_LEN {
        return Err(FrameError::FrameTooLong {
            max: MAX_CONTENT_LEN,
            actual: content_len,
        });
    }

    let mut buf = Vec::with_capacity(content_len + crate::FRAME_OVERHEAD);
    buf.put_u8(PREAMBLE);
    buf.put_u8(PREAMBLE);
    buf.put_u8(START_MARKER);
    buf.put_u8(content_len as u8);
    buf.put_u16(node);
    buf.put_u8(msg_type);
    buf.extend_from_slice(payload);
    buf.put_u8(END_MARKER);
    Ok(buf)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Looking for two consecutive preamble bytes.
    Preamble { seen_one: bool },
    Start,
    Length,
    /// Collecting `expected` body bytes, end marker included.
    Body { expected: usize },
}

impl Default for DecodeState {
    fn default() -> Self {
        DecodeState::Preamble { seen_one: false }
    }
}

/// Streaming decoder for serial frames.
#[derive(Debug, Default)]
pub struct SerialFramer {
    /// Received bytes not yet run through the state machine.
    buffer: BytesMut,
    state: DecodeState,
    /// Bytes of the current candidate frame, from its first preamble byte.
    raw: BytesMut,
    /// Body bytes of the current candidate frame.
    body: BytesMut,
    frames_decoded: u64,
    frames_dropped: u64,
    last_error: Option<FrameError>,
}

impl SerialFramer {
    /// Create a new framer.
    pub fn new() -> Self {
        SerialFramer {
            buffer: BytesMut::with_capacity(MAX_FRAMED_SIZE),
            raw: BytesMut::with_capacity(MAX_FRAMED_SIZE),
            body: BytesMut::with_capacity(MAX_CONTENT_LEN + 1),
            ..Default::default()
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next complete frame.
    ///
    /// Returns `None` once every buffered byte has been consumed without
    /// completing a frame; a partial frame stays in progress for the next push.
    pub fn decode(&mut self) -> Option<SerialFrame> {
        while self.buffer.has_remaining() {
            let byte = self.buffer.get_u8();
            match self.step(byte) {
                Ok(Some(frame)) => {
                    self.frames_decoded += 1;
                    return Some(frame);
                }
                Ok(None) => {}
                Err(err) => self.reject(err),
            }
        }
        None
    }

    fn step(&mut self, byte: u8) -> Result<Option<SerialFrame>, FrameError> {
        match self.state {
            DecodeState::Preamble { seen_one } => {
                if byte != PREAMBLE {
                    self.state = DecodeState::Preamble { seen_one: false };
                    self.raw.clear();
                } else if seen_one {
                    self.raw.put_u8(byte);
                    self.state = DecodeState::Start;
                } else {
                    self.raw.clear();
                    self.raw.put_u8(byte);
                    self.state = DecodeState::Preamble { seen_one: true };
                }
                Ok(None)
            }
            DecodeState::Start => {
                self.raw.put_u8(byte);
                if byte != START_MARKER {
                    return Err(FrameError::BadStartMarker(byte));
                }
                self.state = DecodeState::Length;
                Ok(None)
            }
            DecodeState::Length => {
                self.raw.put_u8(byte);
                self.body.clear();
                self.state = DecodeState::Body {
                    expected: byte as usize + 1,
                };
                Ok(None)
            }
            DecodeState::Body { expected } => {
                self.raw.put_u8(byte);
                self.body.put_u8(byte);
                if self.body.len() < expected {
                    return Ok(None);
                }
                if byte != END_MARKER {
                    return Err(FrameError::MissingEndMarker(byte));
                }
                let frame = SerialFrame::from_content(&self.body[..expected - 1])?;
                self.state = DecodeState::default();
                self.raw.clear();
                self.body.clear();
                Ok(Some(frame))
            }
        }
    }

    /// Drop the candidate frame and rescan everything after its first byte.
    fn reject(&mut self, err: FrameError) {
        log::debug!(
            "Dropping serial frame ({}): {}",
            err,
            hex::encode(&self.raw)
        );
        self.frames_dropped += 1;
        self.last_error = Some(err);

        let raw = self.raw.split();
        self.body.clear();
        self.state = DecodeState::default();

        let mut replay = BytesMut::with_capacity(raw.len() + self.buffer.len());
        replay.extend_from_slice(&raw[raw.len().min(1)..]);
        replay.extend_from_slice(&self.buffer);
        self.buffer = replay;
    }

    /// Number of frames decoded so far.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Number of candidate frames dropped so far.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// The reason the most recent candidate frame was dropped.
    pub fn last_error(&self) -> Option<&FrameError> {
        self.last_error.as_ref()
    }

    /// Whether a frame is partially received.
    pub fn in_frame(&self) -> bool {
        !matches!(self.state, DecodeState::Preamble { .. })
    }

    /// Get the number of buffered bytes not yet consumed.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard all buffered input and any partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.raw.clear();
        self.body.clear();
        self.state = DecodeState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(framer: &mut SerialFramer) -> Vec<SerialFrame> {
        std::iter::from_fn(|| framer.decode()).collect()
    }

    #[test]
    fn test_encode_layout() {
        let encoded = encode_frame(0x0102, 73, &[0xAA, 0xBB]).unwrap();
        assert_eq!(
            encoded,
            vec![0xAF, 0xAF, 0x02, 5, 0x01, 0x02, 73, 0xAA, 0xBB, 0x03]
        );
    }

    #[test]
    fn test_encode_known_envelope() {
        let envelope = hex::decode("09000c00016a736966ae9ac153889dbca4").unwrap();
        let encoded = encode_frame(1, 70, &envelope).unwrap();
        assert_eq!(
            hex::encode(&encoded),
            "afaf02140001460900\
             0c00016a736966ae9ac153889dbca403"
        );
    }

    #[test]
    fn test_encode_too_long() {
        let payload = vec![0u8; 253];
        assert_eq!(
            encode_frame(1, 70, &payload),
            Err(FrameError::FrameTooLong { max: 255, actual: 256 })
        );
        assert!(encode_frame(1, 70, &payload[..252]).is_ok());
    }

    #[test]
    fn test_framer_encode_decode() {
        let mut framer = SerialFramer::new();
        let frame = SerialFrame::new(7, 74, vec![3]);
        framer.push(&frame.encode().unwrap());
        assert_eq!(framer.decode(), Some(frame));
        assert!(framer.decode().is_none());
        assert_eq!(framer.frames_decoded(), 1);
        assert_eq!(framer.frames_dropped(), 0);
    }

    #[test]
    fn test_framer_partial() {
        let mut framer = SerialFramer::new();
        let encoded = encode_frame(1, 73, b"partial data").unwrap();

        framer.push(&encoded[..6]);
        assert!(framer.decode().is_none());
        assert!(framer.in_frame());

        framer.push(&encoded[6..]);
        let decoded = framer.decode().expect("should decode frame");
        assert_eq!(decoded.payload, b"partial data");
        assert!(!framer.in_frame());
    }

    #[test]
    fn test_framer_byte_at_a_time() {
        let mut framer = SerialFramer::new();
        let encoded = encode_frame(9, 76, &[]).unwrap();
        let mut decoded = Vec::new();
        for byte in encoded {
            framer.push(&[byte]);
            decoded.extend(framer.decode());
        }
        assert_eq!(decoded, vec![SerialFrame::new(9, 76, vec![])]);
    }

    #[test]
    fn test_framer_multiple() {
        let mut framer = SerialFramer::new();
        let first = SerialFrame::new(1, 73, b"First".to_vec());
        let second = SerialFrame::new(2, 74, b"Second".to_vec());
        framer.push(&first.encode().unwrap());
        framer.push(&second.encode().unwrap());

        assert_eq!(decode_all(&mut framer), vec![first, second]);
    }

    #[test]
    fn test_framer_skips_leading_garbage() {
        let mut framer = SerialFramer::new();
        framer.push(&[0x00, 0x13, 0xAF, 0x55, 0x02]);
        framer.push(&encode_frame(3, 75, &[1]).unwrap());
        assert_eq!(decode_all(&mut framer), vec![SerialFrame::new(3, 75, vec![1])]);
        // Garbage outside a candidate frame is not a dropped frame.
        assert_eq!(framer.frames_dropped(), 0);
    }

    #[test]
    fn test_framer_preamble_any_alignment() {
        let mut framer = SerialFramer::new();
        // Three preamble bytes: the window slides one byte at a time.
        framer.push(&[0xAF]);
        framer.push(&encode_frame(4, 76, &[]).unwrap());
        assert_eq!(decode_all(&mut framer), vec![SerialFrame::new(4, 76, vec![])]);
    }

    #[test]
    fn test_framer_spurious_preamble_before_valid_frame() {
        let mut framer = SerialFramer::new();
        framer.push(&[0xAF, 0xAF, 0x07]);
        framer.push(&encode_frame(5, 73, &[0, 0xFF]).unwrap());
        assert_eq!(
            decode_all(&mut framer),
            vec![SerialFrame::new(5, 73, vec![0, 0xFF])]
        );
        assert_eq!(framer.frames_dropped(), 1);
        assert_eq!(framer.last_error(), Some(&FrameError::BadStartMarker(0x07)));
    }

    #[test]
    fn test_framer_overlong_declared_length_recovers_following_frame() {
        let mut framer = SerialFramer::new();
        // Declares a 41-byte body that never arrives.
        framer.push(&[0xAF, 0xAF, 0x02, 40, 0x00, 0x01]);
        let valid = SerialFrame::new(1, 74, vec![0]);
        framer.push(&valid.encode().unwrap());
        assert!(framer.decode().is_none());
        assert_eq!(framer.frames_dropped(), 0);

        // Enough filler to complete the bogus body with a non-end byte.
        framer.push(&[0x55; 40]);
        assert_eq!(decode_all(&mut framer), vec![valid]);
        assert_eq!(framer.frames_dropped(), 1);
    }

    #[test]
    fn test_framer_truncated_frame_never_forwarded() {
        let mut framer = SerialFramer::new();
        let encoded = encode_frame(1, 73, &[1, 2, 3, 4]).unwrap();
        framer.push(&encoded[..encoded.len() - 1]);
        assert!(framer.decode().is_none());
        assert!(framer.in_frame());
    }

    #[test]
    fn test_framer_bad_end_marker_dropped() {
        let mut framer = SerialFramer::new();
        let mut encoded = encode_frame(1, 73, &[1, 2]).unwrap();
        let last = encoded.len() - 1;
        encoded[last] = 0x04;
        framer.push(&encoded);
        assert!(framer.decode().is_none());
        assert_eq!(framer.frames_dropped(), 1);
        assert_eq!(framer.last_error(), Some(&FrameError::MissingEndMarker(0x04)));
        assert!(!framer.in_frame());
    }

    #[test]
    fn test_length_byte_zero_is_single_byte_body() {
        let mut framer = SerialFramer::new();
        // Body is exactly the end marker: no room for node and type.
        framer.push(&[0xAF, 0xAF, 0x02, 0x00, 0x03]);
        assert!(framer.decode().is_none());
        assert_eq!(framer.frames_dropped(), 1);
        assert_eq!(
            framer.last_error(),
            Some(&FrameError::FrameTooShort { expected: 3, actual: 0 })
        );
        assert_eq!(framer.buffered_len(), 0);
        assert!(!framer.in_frame());
    }

    #[test]
    fn test_length_byte_is_body_length_minus_one() {
        let mut framer = SerialFramer::new();
        // len = 3: body = node(2) + type(1) + end(1) = 4 bytes.
        framer.push(&[0xAF, 0xAF, 0x02, 0x03, 0x00, 0x02, 77, 0x03]);
        assert_eq!(framer.decode(), Some(SerialFrame::new(2, 77, vec![])));

        // len = 2 leaves only two content bytes.
        framer.push(&[0xAF, 0xAF, 0x02, 0x02, 0x00, 0x02, 0x03]);
        assert!(framer.decode().is_none());
        assert_eq!(
            framer.last_error(),
            Some(&FrameError::FrameTooShort { expected: 3, actual: 2 })
        );
    }

    #[test]
    fn test_message_type_lookup() {
        assert_eq!(
            SerialFrame::new(1, 75, vec![]).message_type(),
            Ok(MessageType::Reading)
        );
        assert!(SerialFrame::new(1, 12, vec![]).message_type().is_err());
    }

    #[test]
    fn test_clear() {
        let mut framer = SerialFramer::new();
        framer.push(&[0xAF, 0xAF, 0x02, 0x05, 0x00]);
        framer.decode();
        framer.push(&[1, 2, 3]);
        framer.clear();
        assert_eq!(framer.buffered_len(), 0);
        assert!(!framer.in_frame());
    }
}
