use crate::{MeshTransport, TransportHeader};
use meshnet_packet::NodeAddr;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// A datagram in flight on the simulated mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimPacket {
    /// Sender address.
    pub from: NodeAddr,
    /// Receiver address.
    pub to: NodeAddr,
    /// Raw message type byte.
    pub msg_type: u8,
    /// Datagram body.
    pub data: Vec<u8>,
}

impl SimPacket {
    /// Create a packet.
    pub fn new(from: NodeAddr, to: NodeAddr, msg_type: u8, data: impl Into<Vec<u8>>) -> Self {
        SimPacket {
            from,
            to,
            msg_type,
            data: data.into(),
        }
    }
}

#[derive(Debug)]
struct Endpoint {
    inbox: VecDeque<SimPacket>,
    link_up: bool,
    failures_pending: usize,
    renewals: usize,
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint {
            inbox: VecDeque::new(),
            link_up: true,
            failures_pending: 0,
            renewals: 0,
        }
    }
}

#[derive(Debug, Default)]
struct MeshState {
    endpoints: HashMap<NodeAddr, Endpoint>,
    /// Accepted packets, kept only when logging was asked for.
    log: Option<Vec<SimPacket>>,
}

/// A lossless, instantly-delivering mesh shared by every endpoint created from it.
///
/// Delivery only fails when the sender's link is down, when a failure was
/// scheduled with [`SimMesh::fail_next_sends`], or when no endpoint exists at
/// the destination.
///
/// Accepted packets are not kept unless the mesh was built with
/// [`SimMesh::with_log`].
#[derive(Debug, Clone, Default)]
pub struct SimMesh {
    state: Rc<RefCell<MeshState>>,
}

impl SimMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mesh that records every accepted packet until
    /// [`SimMesh::take_delivered`] drains them.
    pub fn with_log() -> Self {
        let mesh = Self::default();
        mesh.state.borrow_mut().log = Some(Vec::new());
        mesh
    }

    /// Attach an endpoint at `addr`, or get another handle to an existing one.
    pub fn endpoint(&self, addr: NodeAddr) -> SimTransport {
        self.state.borrow_mut().endpoints.entry(addr).or_default();
        SimTransport {
            addr,
            mesh: self.clone(),
        }
    }

    /// Place a packet straight into its destination's inbox.
    ///
    /// Returns `false` if no endpoint exists at `packet.to`.
    pub fn inject(&self, packet: SimPacket) -> bool {
        let mut state = self.state.borrow_mut();
        match state.endpoints.get_mut(&packet.to) {
            Some(endpoint) => {
                endpoint.inbox.push_back(packet);
                true
            }
            None => false,
        }
    }

    /// Take the oldest undelivered packet addressed to `addr`.
    pub fn pop(&self, addr: NodeAddr) -> Option<SimPacket> {
        self.state
            .borrow_mut()
            .endpoints
            .get_mut(&addr)
            .and_then(|e| e.inbox.pop_front())
    }

    /// Number of undelivered packets addressed to `addr`.
    pub fn pending(&self, addr: NodeAddr) -> usize {
        self.state
            .borrow()
            .endpoints
            .get(&addr)
            .map_or(0, |e| e.inbox.len())
    }

    /// Bring an endpoint's link up or down.
    pub fn set_link_up(&self, addr: NodeAddr, up: bool) {
        if let Some(endpoint) = self.state.borrow_mut().endpoints.get_mut(&addr) {
            endpoint.link_up = up;
        }
    }

    /// Make the next `count` sends from `addr` fail.
    pub fn fail_next_sends(&self, addr: NodeAddr, count: usize) {
        if let Some(endpoint) = self.state.borrow_mut().endpoints.get_mut(&addr) {
            endpoint.failures_pending = count;
        }
    }

    /// How many times `addr` asked for address renewal.
    pub fn renewals(&self, addr: NodeAddr) -> usize {
        self.state
            .borrow()
            .endpoints
            .get(&addr)
            .map_or(0, |e| e.renewals)
    }

    /// Packets accepted since the last call, in send order.
    ///
    /// Always empty unless the mesh was built with [`SimMesh::with_log`].
    pub fn take_delivered(&self) -> Vec<SimPacket> {
        self.state
            .borrow_mut()
            .log
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

/// One endpoint on a [`SimMesh`].
#[derive(Debug, Clone)]
pub struct SimTransport {
    addr: NodeAddr,
    mesh: SimMesh,
}

impl SimTransport {
    /// The mesh this endpoint belongs to.
    pub fn mesh(&self) -> &SimMesh {
        &self.mesh
    }
}

impl MeshTransport for SimTransport {
    fn address(&self) -> NodeAddr {
        self.addr
    }

    fn send(&mut self, dest: NodeAddr, msg_type: u8, data: &[u8]) -> bool {
        let mut guard = self.mesh.state.borrow_mut();
        let state = &mut *guard;
        let Some(sender) = state.endpoints.get_mut(&self.addr) else {
            return false;
        };
        if !sender.link_up {
            log::trace!("sim mesh: {} link down, dropping send to {}", self.addr, dest);
            return false;
        }
        if sender.failures_pending > 0 {
            sender.failures_pending -= 1;
            log::trace!("sim mesh: scheduled send failure {} -> {}", self.addr, dest);
            return false;
        }

        let packet = SimPacket::new(self.addr, dest, msg_type, data);
        let Some(endpoint) = state.endpoints.get_mut(&dest) else {
            log::trace!("sim mesh: no route {} -> {}", self.addr, dest);
            return false;
        };
        if let Some(recorded) = state.log.as_mut() {
            recorded.push(packet.clone());
        }
        endpoint.inbox.push_back(packet);
        true
    }

    fn available(&self) -> bool {
        self.mesh.pending(self.addr) > 0
    }

    fn receive(&mut self, buf: &mut [u8]) -> Option<TransportHeader> {
        let packet = self.mesh.pop(self.addr)?;
        let len = packet.data.len().min(buf.len());
        buf[..len].copy_from_slice(&packet.data[..len]);
        Some(TransportHeader {
            from: packet.from,
            to: packet.to,
            msg_type: packet.msg_type,
            len,
        })
    }

    fn check_connection(&mut self) -> bool {
        self.mesh
            .state
            .borrow()
            .endpoints
            .get(&self.addr)
            .is_some_and(|e| e.link_up)
    }

    fn renew_address(&mut self) {
        if let Some(endpoint) = self.mesh.state.borrow_mut().endpoints.get_mut(&self.addr) {
            endpoint.renewals += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_and_receive() {
        let mesh = SimMesh::with_log();
        let mut master = mesh.endpoint(0);
        let mut node = mesh.endpoint(3);

        assert!(node.send(0, 70, &[1, 2, 3]));
        assert!(master.available());

        let mut buf = [0u8; 8];
        let header = master.receive(&mut buf).unwrap();
        assert_eq!(
            header,
            TransportHeader {
                from: 3,
                to: 0,
                msg_type: 70,
                len: 3
            }
        );
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert!(master.receive(&mut buf).is_none());
        assert_eq!(mesh.take_delivered(), vec![SimPacket::new(3, 0, 70, vec![1, 2, 3])]);
        assert!(mesh.take_delivered().is_empty());
    }

    #[test]
    fn test_unlogged_mesh_keeps_nothing() {
        let mesh = SimMesh::new();
        let mut master = mesh.endpoint(0);
        let mut node = mesh.endpoint(1);

        let mut buf = [0u8; 4];
        for i in 0..10_000u16 {
            assert!(node.send(0, 77, &i.to_be_bytes()));
            assert!(master.receive(&mut buf).is_some());
        }
        assert_eq!(mesh.pending(0), 0);
        assert!(mesh.take_delivered().is_empty());
        assert!(mesh.state.borrow().log.is_none());
    }

    #[test]
    fn test_receive_truncates() {
        let mesh = SimMesh::new();
        let mut node = mesh.endpoint(1);
        assert!(mesh.inject(SimPacket::new(0, 1, 73, vec![9; 10])));
        let mut buf = [0u8; 4];
        assert_eq!(node.receive(&mut buf).unwrap().len, 4);
    }

    #[test]
    fn test_send_without_route_fails() {
        let mesh = SimMesh::new();
        let mut node = mesh.endpoint(1);
        assert!(!node.send(9, 70, &[]));
        assert!(!mesh.inject(SimPacket::new(1, 9, 70, vec![])));
    }

    #[test]
    fn test_link_down_and_renewal() {
        let mesh = SimMesh::new();
        let _master = mesh.endpoint(0);
        let mut node = mesh.endpoint(1);

        mesh.set_link_up(1, false);
        assert!(!node.check_connection());
        assert!(!node.send(0, 77, &[]));
        node.renew_address();
        assert_eq!(mesh.renewals(1), 1);

        mesh.set_link_up(1, true);
        assert!(node.check_connection());
        assert!(node.send(0, 77, &[]));
    }

    #[test]
    fn test_scheduled_failures() {
        let mesh = SimMesh::new();
        let _master = mesh.endpoint(0);
        let mut node = mesh.endpoint(1);

        mesh.fail_next_sends(1, 2);
        assert!(!node.send(0, 77, &[]));
        assert!(!node.send(0, 77, &[]));
        assert!(node.send(0, 77, &[]));
        assert_eq!(mesh.pending(0), 1);
    }
}
