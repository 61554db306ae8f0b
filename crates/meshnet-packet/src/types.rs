//! Wire constants, addresses and message types.

use crate::PacketError;
use std::fmt;

// ============================================================================
// Sizes
// ============================================================================

/// Maximum number of application payload bytes in one envelope.
pub const PAYLOAD_LEN: usize = 32;
/// Length of the authentication tag.
pub const TAG_LEN: usize = 8;
/// Width of the length prefix.
pub const LEN_PREFIX: usize = 1;
/// Width of the session id field.
pub const SESSION_LEN: usize = 2;
/// Width of the counter field.
pub const COUNTER_LEN: usize = 2;
/// Bytes before the payload: length prefix, session id, counter.
pub const HEADER_LEN: usize = LEN_PREFIX + SESSION_LEN + COUNTER_LEN;
/// Total envelope buffer capacity.
pub const ENVELOPE_CAPACITY: usize = PAYLOAD_LEN + TAG_LEN + HEADER_LEN;
/// Smallest well-formed envelope on the wire (no payload).
pub const MIN_ENVELOPE_LEN: usize = HEADER_LEN + TAG_LEN;
/// Size of the pre-shared key.
pub const KEY_LEN: usize = 16;

// ============================================================================
// Addresses
// ============================================================================

/// Mesh address of a node.
pub type NodeAddr = u16;

/// Mesh address of the master.
pub const MASTER_ADDR: NodeAddr = 0;

// ============================================================================
// Message Types
// ============================================================================

/// Application message types carried in the transport header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Node announces itself after boot. Payload: uptime.
    Booted = 70,
    /// Master sends one device configuration record.
    Configure = 71,
    /// Master completes configuration. Payload: session id.
    Configured = 72,
    /// Master sets a device state. Payload: device id, state bytes.
    SetState = 73,
    /// Master requests a device state. Payload: device id.
    GetState = 74,
    /// Node reports a device state. Payload: device id, state bytes.
    Reading = 75,
    /// Liveness probe.
    Ping = 76,
    /// Acknowledgement and keepalive. Payload: uptime.
    Pong = 77,
    /// Master forces the node to restart.
    Reset = 78,
}

impl MessageType {
    /// All message types in wire order.
    pub const ALL: [MessageType; 9] = [
        MessageType::Booted,
        MessageType::Configure,
        MessageType::Configured,
        MessageType::SetState,
        MessageType::GetState,
        MessageType::Reading,
        MessageType::Ping,
        MessageType::Pong,
        MessageType::Reset,
    ];

    /// Wire value of this message type.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Lowercase name, used in logs and metric labels.
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageType::Booted => "booted",
            MessageType::Configure => "configure",
            MessageType::Configured => "configured",
            MessageType::SetState => "set_state",
            MessageType::GetState => "get_state",
            MessageType::Reading => "reading",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::Reset => "reset",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MessageType::ALL
            .iter()
            .copied()
            .find(|t| t.as_u8() == value)
            .ok_or(PacketError::InvalidMessageType(value))
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(ENVELOPE_CAPACITY, 45);
        assert_eq!(MIN_ENVELOPE_LEN, 13);
        assert_eq!(HEADER_LEN + PAYLOAD_LEN, 37);
    }

    #[test]
    fn test_message_type_values() {
        assert_eq!(MessageType::Booted.as_u8(), 70);
        assert_eq!(MessageType::Reset.as_u8(), 78);
        for t in MessageType::ALL {
            assert_eq!(MessageType::try_from(t.as_u8()), Ok(t));
        }
    }

    #[test]
    fn test_message_type_unknown() {
        assert_eq!(
            MessageType::try_from(69),
            Err(PacketError::InvalidMessageType(69))
        );
        assert!(MessageType::try_from(79).is_err());
    }
}
