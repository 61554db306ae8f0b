//! Serial-over-TCP tests against real loopback sockets.

use meshnet_common::SerialPort;
use meshnet_runner::SyncUartManager;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

const MASTER: u16 = 0;
const NODE: u16 = 1;
const TIMEOUT: Duration = Duration::from_secs(5);

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < TIMEOUT {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

struct Rig {
    // Keeps the listeners alive.
    _runtime: tokio::runtime::Runtime,
    uart: SyncUartManager,
    port: u16,
}

impl Rig {
    fn new() -> Self {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut uart = SyncUartManager::new(runtime.handle().clone());
        uart.register_node(MASTER, "hub".to_string(), "master".to_string(), Some(0));
        uart.register_node(NODE, "kitchen".to_string(), "node".to_string(), None);
        uart.start().unwrap();

        let port = uart
            .node_infos()
            .iter()
            .find(|info| info.address == MASTER)
            .and_then(|info| info.port)
            .unwrap();
        assert_ne!(port, 0);
        Rig {
            _runtime: runtime,
            uart,
            port,
        }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(("127.0.0.1", self.port)).unwrap();
        stream.set_read_timeout(Some(TIMEOUT)).unwrap();
        assert!(wait_for(|| self.uart.is_client_connected(MASTER)));
        stream
    }
}

#[test]
fn test_only_serial_devices_get_ports() {
    let rig = Rig::new();
    let infos = rig.uart.node_infos();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[1].name, "kitchen");
    assert_eq!(infos[1].port, None);

    assert!(rig.uart.serial_port(MASTER).is_some());
    assert!(rig.uart.serial_port(NODE).is_none());
    assert!(!rig.uart.is_client_connected(MASTER));
}

#[test]
fn test_port_reads_client_bytes() {
    let rig = Rig::new();
    let mut port = rig.uart.serial_port(MASTER).unwrap();
    let mut client = rig.connect();
    assert!(port.is_connected());

    client.write_all(&[1, 2, 3, 4, 5]).unwrap();
    let mut received = Vec::new();
    let mut buf = [0u8; 2];
    assert!(wait_for(|| {
        let n = port.read(&mut buf);
        received.extend_from_slice(&buf[..n]);
        received.len() == 5
    }));
    assert_eq!(received, vec![1, 2, 3, 4, 5]);
    assert_eq!(port.read(&mut buf), 0);
}

#[test]
fn test_port_writes_reach_client() {
    let rig = Rig::new();
    let mut port = rig.uart.serial_port(MASTER).unwrap();
    let mut client = rig.connect();

    port.write(&[0xAF, 0xAF, 0x02]);
    let mut buf = [0u8; 3];
    client.read_exact(&mut buf).unwrap();
    assert_eq!(buf, [0xAF, 0xAF, 0x02]);
}

#[test]
fn test_writes_without_client_are_dropped() {
    let rig = Rig::new();
    let mut port = rig.uart.serial_port(MASTER).unwrap();
    port.write(b"lost");
    rig.uart.send_to_client(MASTER, b"also lost");

    let mut client = rig.connect();
    rig.uart.send_to_client(MASTER, b"seen");
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"seen");
}

#[test]
fn test_manager_receives_from_client() {
    let rig = Rig::new();
    let mut client = rig.connect();
    assert!(rig.uart.try_recv_from_client(MASTER).is_none());
    assert!(rig.uart.try_recv_from_client(NODE).is_none());

    client.write_all(b"ping").unwrap();
    let mut received = Vec::new();
    assert!(wait_for(|| {
        if let Some(chunk) = rig.uart.try_recv_from_client(MASTER) {
            received.extend(chunk);
        }
        received.len() == 4
    }));
    assert_eq!(received, b"ping");
}

#[test]
fn test_disconnect_is_tracked() {
    let rig = Rig::new();
    let client = rig.connect();
    drop(client);
    assert!(wait_for(|| !rig.uart.is_client_connected(MASTER)));

    // The port accepts a new client afterwards.
    let _client = rig.connect();
    assert!(rig.uart.is_client_connected(MASTER));
}
