//! Envelope authentication.
//!
//! Every envelope carries an 8-byte tag computed with SipHash-2-4 keyed by the
//! network's 128-bit pre-shared key. The tag input binds the message to its
//! sender, receiver and message type:
//!
//! ```text
//! from (2B BE) || to (2B BE) || type (1B) || content bytes
//! ```
//!
//! where the content bytes are everything before the tag, length prefix included.

use crate::{NodeAddr, PacketError, ENVELOPE_CAPACITY, KEY_LEN, MIN_ENVELOPE_LEN, TAG_LEN};
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher24;
use std::fmt;
use std::hash::Hasher;
use std::str::FromStr;

// ============================================================================
// Key
// ============================================================================

/// The network-wide pre-shared authentication key.
///
/// Serialized as a 32-character hex string so it can live in config files.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthKey(pub [u8; KEY_LEN]);

impl AuthKey {
    /// Create a key from raw bytes.
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        AuthKey(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Parse a key from its hex representation.
    pub fn from_hex(s: &str) -> Result<Self, PacketError> {
        let bytes = hex::decode(s.trim()).map_err(|e| PacketError::invalid_key(e.to_string()))?;
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            PacketError::invalid_key(format!("expected {} bytes, got {}", KEY_LEN, v.len()))
        })?;
        Ok(AuthKey(bytes))
    }

    /// Hex representation of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for AuthKey {
    fn default() -> Self {
        AuthKey([0u8; KEY_LEN])
    }
}

// Keys end up in logs via config dumps; only show a prefix.
impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthKey({}..)", hex::encode(&self.0[..2]))
    }
}

impl FromStr for AuthKey {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuthKey::from_hex(s)
    }
}

impl TryFrom<String> for AuthKey {
    type Error = PacketError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AuthKey::from_hex(&value)
    }
}

impl From<AuthKey> for String {
    fn from(value: AuthKey) -> Self {
        value.to_hex()
    }
}

// ============================================================================
// Tag Calculation
// ============================================================================

/// Compute the authentication tag for `content`.
pub fn compute_tag(
    key: &AuthKey,
    from: NodeAddr,
    to: NodeAddr,
    msg_type: u8,
    content: &[u8],
) -> [u8; TAG_LEN] {
    let mut hasher = SipHasher24::new_with_key(&key.0);
    hasher.write(&from.to_be_bytes());
    hasher.write(&to.to_be_bytes());
    hasher.write(&[msg_type]);
    hasher.write(content);
    hasher.finish().to_be_bytes()
}

/// Verify a complete wire envelope without copying it.
///
/// Returns the content length (the value of the length prefix) on success.
pub fn verify_wire(
    key: &AuthKey,
    from: NodeAddr,
    to: NodeAddr,
    msg_type: u8,
    wire: &[u8],
) -> Result<usize, PacketError> {
    if wire.len() < MIN_ENVELOPE_LEN {
        return Err(PacketError::TooShort {
            len: wire.len(),
            min: MIN_ENVELOPE_LEN,
        });
    }
    if wire.len() > ENVELOPE_CAPACITY {
        return Err(PacketError::TooLong {
            len: wire.len(),
            max: ENVELOPE_CAPACITY,
        });
    }

    let content_len = wire[0] as usize;
    if content_len + TAG_LEN != wire.len() {
        return Err(PacketError::LengthMismatch {
            declared: content_len + TAG_LEN,
            received: wire.len(),
        });
    }

    let (content, tag) = wire.split_at(content_len);
    let expected = compute_tag(key, from, to, msg_type, content);
    if !tags_equal(&expected, tag) {
        return Err(PacketError::TagMismatch);
    }

    Ok(content_len)
}

/// Byte-wise comparison that always inspects every byte.
fn tags_equal(expected: &[u8; TAG_LEN], received: &[u8]) -> bool {
    received.len() == TAG_LEN
        && expected
            .iter()
            .zip(received)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
