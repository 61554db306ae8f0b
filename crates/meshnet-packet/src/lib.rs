//! # meshnet-packet
//!
//! Authenticated envelope encoding, decoding, and verification for MeshNet.
//!
//! Every application message exchanged between a node and the master travels
//! inside an [`Envelope`]: a length-prefixed buffer carrying the session id, a
//! monotonic counter, up to [`PAYLOAD_LEN`] payload bytes and an 8-byte
//! SipHash-2-4 tag bound to the sender, receiver and message type.
//!
//! ## Usage
//!
//! ```
//! use meshnet_packet::{AuthKey, Envelope, MessageType, MASTER_ADDR};
//!
//! let key = AuthKey::new([7u8; 16]);
//!
//! let mut out = Envelope::new();
//! out.init(42, 1);
//! out.set_short(1000)?;
//! let len = out.finalize(&key, 5, MASTER_ADDR, MessageType::Pong);
//!
//! let mut inbound = Envelope::from_wire(&out.as_bytes()[..len])?;
//! inbound.verify(&key, 5, MASTER_ADDR, MessageType::Pong, len)?;
//! assert_eq!(inbound.read_header()?, (42, 1));
//! assert_eq!(inbound.get_short()?, 1000);
//! # Ok::<(), meshnet_packet::PacketError>(())
//! ```

pub mod auth;
pub mod envelope;
pub mod error;
pub mod types;

pub use auth::{compute_tag, verify_wire, AuthKey};
pub use envelope::{Envelope, BOOL_TRUE};
pub use error::PacketError;
pub use types::*;
