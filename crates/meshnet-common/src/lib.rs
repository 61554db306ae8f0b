//! # meshnet-common
//!
//! The collaborators MeshNet firmware runs against, expressed as traits, plus
//! in-memory implementations of each for tests and the simulator.
//!
//! - [`MeshTransport`]: addressed, typed datagram delivery over the mesh.
//! - [`Hardware`]: digital and analog pin access.
//! - [`Clock`]: wrapping millisecond and microsecond counters.
//! - [`SerialPort`]: the master's non-blocking byte link to its host.

pub mod sim;

mod clock;
mod hardware;
mod serial;
mod transport;

pub use clock::{elapsed_ms, Clock, Interval, SystemClock};
pub use hardware::{Hardware, PinMode};
pub use serial::SerialPort;
pub use transport::{MeshTransport, TransportHeader};
