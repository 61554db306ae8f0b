//! The authenticated message envelope.
//!
//! # Wire Format
//!
//! ```text
//! +-------------+------------+------------+-------------------+---------+
//! | content_len | session_id | counter    | payload (<= 32 B) | tag     |
//! | 1 byte      | 2 bytes BE | 2 bytes BE |                   | 8 bytes |
//! +-------------+------------+------------+-------------------+---------+
//! ```
//!
//! `content_len` counts every byte before the tag, itself included.
//!
//! An [`Envelope`] is a fixed-capacity buffer with a sequential cursor. Outgoing
//! messages are built with [`Envelope::init`], the `set_*` writers, and
//! [`Envelope::finalize`]. Incoming messages are received into
//! [`Envelope::buffer_mut`] after [`Envelope::reset`], checked with
//! [`Envelope::verify`], and then read with the `get_*` readers.

use crate::auth::{compute_tag, verify_wire, AuthKey};
use crate::{
    MessageType, NodeAddr, PacketError, ENVELOPE_CAPACITY, HEADER_LEN, PAYLOAD_LEN, TAG_LEN,
};
use std::fmt;

/// Wire value written for `true`.
pub const BOOL_TRUE: u8 = 0xFF;

/// A fixed-capacity envelope buffer with a read/write cursor.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    buf: [u8; ENVELOPE_CAPACITY],
    pos: usize,
    len: usize,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("pos", &self.pos)
            .field("len", &self.len)
            .field("bytes", &hex::encode(self.as_bytes()))
            .finish()
    }
}

impl Envelope {
    /// Create an empty envelope.
    pub const fn new() -> Self {
        Envelope {
            buf: [0u8; ENVELOPE_CAPACITY],
            pos: 0,
            len: 0,
        }
    }

    /// Copy received wire bytes into a fresh envelope, ready for [`Envelope::verify`].
    pub fn from_wire(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() > ENVELOPE_CAPACITY {
            return Err(PacketError::TooLong {
                len: bytes.len(),
                max: ENVELOPE_CAPACITY,
            });
        }
        let mut envelope = Envelope::new();
        envelope.buf[..bytes.len()].copy_from_slice(bytes);
        envelope.len = bytes.len();
        Ok(envelope)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start an outgoing message stamped with `session_id` and `counter`.
    ///
    /// The logical length is provisionally the full payload extent so the
    /// payload writers can fill up to [`PAYLOAD_LEN`] bytes.
    pub fn init(&mut self, session_id: u16, counter: u16) {
        self.buf = [0u8; ENVELOPE_CAPACITY];
        self.len = HEADER_LEN + PAYLOAD_LEN;
        self.buf[1..3].copy_from_slice(&session_id.to_be_bytes());
        self.buf[3..5].copy_from_slice(&counter.to_be_bytes());
        self.pos = HEADER_LEN;
    }

    /// Seal the message: write the length prefix and append the tag.
    ///
    /// Returns the number of bytes to hand to the transport.
    pub fn finalize(
        &mut self,
        key: &AuthKey,
        from: NodeAddr,
        to: NodeAddr,
        msg_type: MessageType,
    ) -> usize {
        let content_len = self.pos;
        self.buf[0] = content_len as u8;
        let tag = compute_tag(key, from, to, msg_type.as_u8(), &self.buf[..content_len]);
        self.buf[content_len..content_len + TAG_LEN].copy_from_slice(&tag);
        self.len = content_len + TAG_LEN;
        self.len
    }

    /// Prepare the envelope to receive inbound bytes.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.len = 0;
    }

    /// The whole underlying buffer, for the transport to receive into.
    pub fn buffer_mut(&mut self) -> &mut [u8; ENVELOPE_CAPACITY] {
        &mut self.buf
    }

    /// Validate `received_len` bytes previously written into [`Envelope::buffer_mut`].
    ///
    /// On success the logical length becomes the content length and the
    /// cursor sits on the session id. On failure the envelope must not be read.
    pub fn verify(
        &mut self,
        key: &AuthKey,
        from: NodeAddr,
        to: NodeAddr,
        msg_type: MessageType,
        received_len: usize,
    ) -> Result<(), PacketError> {
        if received_len > ENVELOPE_CAPACITY {
            return Err(PacketError::TooLong {
                len: received_len,
                max: ENVELOPE_CAPACITY,
            });
        }
        let content_len = verify_wire(key, from, to, msg_type.as_u8(), &self.buf[..received_len])?;
        self.len = content_len;
        self.pos = 1;
        Ok(())
    }

    /// Read the session id and counter of a verified envelope.
    pub fn read_header(&mut self) -> Result<(u16, u16), PacketError> {
        self.pos = 1;
        let session_id = self.get_short()?;
        let counter = self.get_short()?;
        Ok((session_id, counter))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Declared logical length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the declared length is zero.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes left between the cursor and the declared length.
    pub fn remain(&self) -> usize {
        self.len.saturating_sub(self.pos)
    }

    /// The logical bytes of the envelope.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    fn claim(&mut self, n: usize) -> Result<usize, PacketError> {
        if self.pos + n > self.len {
            return Err(PacketError::overrun(self.pos, n, self.len));
        }
        let start = self.pos;
        self.pos += n;
        Ok(start)
    }

    /// Read one byte.
    pub fn get_byte(&mut self) -> Result<u8, PacketError> {
        let at = self.claim(1)?;
        Ok(self.buf[at])
    }

    /// Write one byte.
    pub fn set_byte(&mut self, value: u8) -> Result<(), PacketError> {
        let at = self.claim(1)?;
        self.buf[at] = value;
        Ok(())
    }

    /// Read a big-endian 16-bit value.
    pub fn get_short(&mut self) -> Result<u16, PacketError> {
        let at = self.claim(2)?;
        Ok(u16::from_be_bytes([self.buf[at], self.buf[at + 1]]))
    }

    /// Write a big-endian 16-bit value.
    pub fn set_short(&mut self, value: u16) -> Result<(), PacketError> {
        let at = self.claim(2)?;
        self.buf[at..at + 2].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Read a boolean; any non-zero byte is `true`.
    pub fn get_bool(&mut self) -> Result<bool, PacketError> {
        Ok(self.get_byte()? != 0)
    }

    /// Write a boolean as `0xFF` or `0x00`.
    pub fn set_bool(&mut self, value: bool) -> Result<(), PacketError> {
        self.set_byte(if value { BOOL_TRUE } else { 0 })
    }

    /// Read `n` raw bytes.
    pub fn get_bytes(&mut self, n: usize) -> Result<&[u8], PacketError> {
        let at = self.claim(n)?;
        Ok(&self.buf[at..at + n])
    }

    /// Write raw bytes.
    pub fn set_bytes(&mut self, data: &[u8]) -> Result<(), PacketError> {
        let at = self.claim(data.len())?;
        self.buf[at..at + data.len()].copy_from_slice(data);
        Ok(())
    }
}
