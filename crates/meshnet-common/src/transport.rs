//! Mesh transport abstraction.

use meshnet_packet::NodeAddr;

/// Header of a received mesh datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHeader {
    /// Sender address.
    pub from: NodeAddr,
    /// Receiver address.
    pub to: NodeAddr,
    /// Raw message type byte.
    pub msg_type: u8,
    /// Number of bytes copied into the receive buffer.
    pub len: usize,
}

/// Addressed, typed datagram delivery provided by the mesh network layer.
///
/// Routing, address assignment and radio control live behind this trait.
pub trait MeshTransport {
    /// This endpoint's mesh address.
    fn address(&self) -> NodeAddr;

    /// Service the network stack. Called once per tick before receiving.
    fn update(&mut self) {}

    /// Send one datagram. Returns `false` if the mesh did not accept it.
    fn send(&mut self, dest: NodeAddr, msg_type: u8, data: &[u8]) -> bool;

    /// Whether a datagram is waiting.
    fn available(&self) -> bool;

    /// Receive the next datagram into `buf`, truncating if it does not fit.
    fn receive(&mut self, buf: &mut [u8]) -> Option<TransportHeader>;

    /// Whether this endpoint still has a working route to the mesh.
    fn check_connection(&mut self) -> bool;

    /// Ask the mesh for a fresh address/route.
    fn renew_address(&mut self);
}
