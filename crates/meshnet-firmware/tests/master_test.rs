//! Host ↔ master ↔ node integration tests.
//!
//! The host side builds envelopes itself and talks to the master over a
//! simulated serial cable, the way the host application does.

use meshnet_common::sim::{ManualClock, SimHardware, SimMesh, SimPacket, SimSerial, SimTransport};
use meshnet_common::SerialPort;
use meshnet_firmware::{ItemKind, MasterConfig, MasterFirmware, NodeConfig, NodeFirmware, NodeState};
use meshnet_packet::{AuthKey, Envelope, MessageType, NodeAddr, MASTER_ADDR};
use meshnet_serial_protocol::{encode_frame, SerialFrame, SerialFramer};

const NODE: NodeAddr = 2;

struct Bench {
    mesh: SimMesh,
    hw: SimHardware,
    key: AuthKey,
    host: SimSerial,
    host_framer: SerialFramer,
    master: MasterFirmware<SimTransport, SimSerial>,
    node: NodeFirmware<SimTransport, SimHardware, ManualClock>,
}

impl Bench {
    fn new() -> Self {
        let mesh = SimMesh::new();
        let key = AuthKey::new([0x5a; 16]);
        let (port, host) = SimSerial::pair();
        let master = MasterFirmware::new(MasterConfig::new(key), mesh.endpoint(MASTER_ADDR), port);
        let hw = SimHardware::new();
        let node = NodeFirmware::new(
            NodeConfig::new("porch", key),
            mesh.endpoint(NODE),
            hw.clone(),
            ManualClock::starting_at(5_000),
        )
        .unwrap();
        Bench {
            mesh,
            hw,
            key,
            host,
            host_framer: SerialFramer::new(),
            master,
            node,
        }
    }

    fn tick(&mut self) {
        self.master.process();
        self.node.process();
        self.master.process();
    }

    fn host_send(&mut self, msg_type: MessageType, session: u16, counter: u16, payload: &[u8]) {
        let mut env = Envelope::new();
        env.init(session, counter);
        env.set_bytes(payload).unwrap();
        let len = env.finalize(&self.key, MASTER_ADDR, NODE, msg_type);
        let frame = encode_frame(NODE, msg_type.as_u8(), &env.as_bytes()[..len]).unwrap();
        self.host.write(&frame);
    }

    fn host_frames(&mut self) -> Vec<SerialFrame> {
        let bytes = self.host.read_all();
        self.host_framer.push(&bytes);
        std::iter::from_fn(|| self.host_framer.decode()).collect()
    }

    /// Verify a frame from the node and return its session and payload.
    fn open(&self, frame: &SerialFrame) -> (MessageType, u16, Vec<u8>) {
        let msg_type = frame.message_type().unwrap();
        let mut env = Envelope::from_wire(&frame.payload).unwrap();
        env.verify(&self.key, frame.node, MASTER_ADDR, msg_type, frame.payload.len())
            .unwrap();
        let (session, _counter) = env.read_header().unwrap();
        (msg_type, session, env.get_bytes(env.remain()).unwrap().to_vec())
    }
}

#[test]
fn test_handshake_through_master() {
    let mut bench = Bench::new();

    bench.tick();
    let frames = bench.host_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].node, NODE);
    let (msg_type, provisional, payload) = bench.open(&frames[0]);
    assert_eq!(msg_type, MessageType::Booted);
    assert_eq!(payload, 5u16.to_be_bytes());

    bench.host_send(
        MessageType::Configure,
        provisional,
        1,
        &[ItemKind::Dimmer.as_u8(), 9, b'f', b'a', b'n'],
    );
    bench.tick();
    let frames = bench.host_frames();
    assert_eq!(bench.open(&frames[0]).0, MessageType::Pong);

    bench.host_send(MessageType::Configured, provisional, 2, &[0x12, 0x34]);
    bench.tick();
    let frames = bench.host_frames();
    assert_eq!(bench.open(&frames[0]).0, MessageType::Pong);
    assert_eq!(bench.node.state(), NodeState::Running);
    assert_eq!(bench.node.session().id, 0x1234);

    bench.host_send(MessageType::SetState, 0x1234, 1, &[0, 200]);
    bench.tick();
    assert_eq!(bench.hw.analog_output(9), Some(200));
    let frames = bench.host_frames();
    let (msg_type, session, payload) = bench.open(&frames[0]);
    assert_eq!(msg_type, MessageType::Reading);
    assert_eq!(session, 0x1234);
    assert_eq!(payload, vec![0, 200]);
}

#[test]
fn test_unauthenticated_uplink_never_reaches_host() {
    let mut bench = Bench::new();
    bench.mesh.endpoint(7);

    let mut env = Envelope::new();
    env.init(1, 1);
    env.set_short(3).unwrap();
    let len = env.finalize(&AuthKey::new([0x11; 16]), 7, MASTER_ADDR, MessageType::Booted);
    bench.mesh.inject(SimPacket::new(
        7,
        MASTER_ADDR,
        MessageType::Booted.as_u8(),
        env.as_bytes()[..len].to_vec(),
    ));

    bench.master.process();
    assert!(bench.host_frames().is_empty());
}

#[test]
fn test_host_noise_is_skipped() {
    let mut bench = Bench::new();
    bench.tick();
    let frames = bench.host_frames();
    let (_, provisional, _) = bench.open(&frames[0]);

    // Stray preamble and a frame with a bad end marker ahead of a real one.
    bench.host.write(&[0xAF, 0xAF, 0xAF, 0x13, 0xAF, 0xAF, 0x02, 0x03, 0, 2, 76, 0x99]);
    bench.host_send(MessageType::Configured, provisional, 1, &[0, 9]);
    bench.tick();

    let frames = bench.host_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(bench.node.state(), NodeState::Running);
    assert!(bench.master.framer().frames_dropped() >= 1);
}
