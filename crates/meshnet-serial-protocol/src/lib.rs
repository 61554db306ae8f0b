//! MeshNet Master Serial Protocol
//!
//! This crate implements the byte-stream framing used between the MeshNet
//! master and the host computer it is attached to. Both directions share the
//! same frame layout:
//!
//! ```text
//! +------+------+-------+-----+---------+------+-----------+------+
//! | 0xAF | 0xAF | 0x02  | len | node BE | type | payload   | 0x03 |
//! +------+------+-------+-----+---------+------+-----------+------+
//! ```
//!
//! `len` is the body length minus one, i.e. the number of content bytes
//! (node + type + payload). Host-to-master frames carry the destination node;
//! master-to-host frames carry the source node.
//!
//! # Example
//!
//! ```rust
//! use meshnet_serial_protocol::{SerialFrame, SerialFramer};
//!
//! let frame = SerialFrame::new(5, 73, vec![0, 0xFF]);
//! let bytes = frame.encode()?;
//!
//! let mut framer = SerialFramer::new();
//! framer.push(&bytes);
//! assert_eq!(framer.decode(), Some(frame));
//! # Ok::<(), meshnet_serial_protocol::FrameError>(())
//! ```

mod constants;
mod error;
mod frame;

pub use constants::*;
pub use error::*;
pub use frame::*;
