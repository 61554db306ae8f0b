//! Serial ports over TCP.
//!
//! Each simulated device with a serial port gets a TCP listener, so a host
//! application can connect to the simulated master exactly as it would to a
//! USB serial adapter. Listeners run on a tokio runtime; the simulation loop
//! reaches them through [`SyncUartManager`] and [`UartPort`], which never
//! await.

use meshnet_common::SerialPort;
use meshnet_packet::NodeAddr;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

/// Addresses that currently have a TCP client attached.
type Attached = Arc<RwLock<HashSet<NodeAddr>>>;

/// Chunks buffered in each direction.
const CHANNEL_DEPTH: usize = 256;

/// A device listed in the node table.
#[derive(Debug, Clone)]
pub struct UartNodeInfo {
    /// Device name from the scenario.
    pub name: String,
    /// Device role (`master` or `node`).
    pub node_type: String,
    /// Mesh address.
    pub address: NodeAddr,
    /// TCP port, for devices with a serial port. Zero asks the OS for a free
    /// port; the bound port replaces it once the listener is up.
    pub port: Option<u16>,
}

/// The simulation's end of one device's TCP link.
#[derive(Clone)]
struct PortChannels {
    to_client: mpsc::Sender<Vec<u8>>,
    from_client: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>,
}

impl PortChannels {
    /// Next chunk the client sent, if one is waiting.
    fn poll(&self) -> Option<Vec<u8>> {
        self.from_client.try_lock().ok()?.try_recv().ok()
    }

    /// Queue bytes for the client if one is attached; drop them otherwise.
    fn offer(&self, attached: &Attached, address: NodeAddr, data: &[u8]) {
        if !is_attached(attached, address) {
            return;
        }
        match self.to_client.try_send(data.to_vec()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    "UART {}: client is not keeping up, dropping {} bytes",
                    address,
                    data.len()
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("UART {}: listener has stopped", address);
            }
        }
    }
}

fn is_attached(attached: &Attached, address: NodeAddr) -> bool {
    attached.read().is_ok_and(|set| set.contains(&address))
}

fn set_attached(attached: &Attached, address: NodeAddr, present: bool) {
    if let Ok(mut set) = attached.write() {
        if present {
            set.insert(address);
        } else {
            set.remove(&address);
        }
    }
}

/// Registered devices and their listeners.
#[derive(Default)]
struct UartServer {
    devices: Vec<UartNodeInfo>,
    channels: HashMap<NodeAddr, PortChannels>,
    attached: Attached,
}

impl UartServer {
    /// Bind every registered serial port and spawn its listener.
    async fn start(&mut self) -> io::Result<()> {
        for device in &mut self.devices {
            let Some(requested) = device.port else {
                continue;
            };
            let listener = TcpListener::bind(("0.0.0.0", requested)).await?;
            let bound = listener.local_addr()?.port();
            device.port = Some(bound);

            let (to_client, outbound) = mpsc::channel(CHANNEL_DEPTH);
            let (inbound, from_client) = mpsc::channel(CHANNEL_DEPTH);
            self.channels.insert(
                device.address,
                PortChannels {
                    to_client,
                    from_client: Arc::new(Mutex::new(from_client)),
                },
            );

            let address = device.address;
            let attached = self.attached.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_port(listener, address, outbound, inbound, attached).await {
                    tracing::error!("UART {}: listener failed: {}", address, e);
                }
            });
            tracing::debug!("UART {} ({}) listening on port {}", address, device.name, bound);
        }
        Ok(())
    }

    fn print_node_table(&self) {
        const WIDTHS: [usize; 4] = [20, 10, 9, 8];
        let rule = |left: &str, mid: &str, right: &str| {
            let cells: Vec<String> = WIDTHS.iter().map(|w| "─".repeat(*w)).collect();
            format!("{}{}{}", left, cells.join(mid), right)
        };

        eprintln!();
        eprintln!("{}", rule("┌", "┬", "┐"));
        eprintln!("│ {:^18} │ {:^8} │ {:^7} │ {:^6} │", "Node Name", "Type", "Address", "Port");
        eprintln!("{}", rule("├", "┼", "┤"));
        for device in &self.devices {
            let port = device.port.map_or_else(|| "-".to_string(), |p| p.to_string());
            eprintln!(
                "│ {:18} │ {:8} │ {:7} │ {:6} │",
                device.name, device.node_type, device.address, port
            );
        }
        eprintln!("{}", rule("└", "┴", "┘"));
        eprintln!();
    }
}

/// Accept clients on one port, one at a time, for as long as the runtime lives.
async fn serve_port(
    listener: TcpListener,
    address: NodeAddr,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    inbound: mpsc::Sender<Vec<u8>>,
    attached: Attached,
) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::info!("UART {}: client {} connected", address, peer);
        set_attached(&attached, address, true);

        let result = pump(stream, &mut outbound, &inbound).await;
        set_attached(&attached, address, false);
        match result {
            Ok(()) => tracing::info!("UART {}: client {} disconnected", address, peer),
            Err(e) => tracing::warn!("UART {}: client {} dropped: {}", address, peer, e),
        }
    }
}

/// Copy bytes both ways between a client and the channels until either side closes.
async fn pump(
    mut stream: TcpStream,
    outbound: &mut mpsc::Receiver<Vec<u8>>,
    inbound: &mpsc::Sender<Vec<u8>>,
) -> io::Result<()> {
    let (mut rx, mut tx) = stream.split();
    let mut buf = [0u8; 1024];
    loop {
        tokio::select! {
            n = rx.read(&mut buf) => {
                let n = n?;
                if n == 0 || inbound.send(buf[..n].to_vec()).await.is_err() {
                    return Ok(());
                }
            }
            Some(chunk) = outbound.recv() => {
                tx.write_all(&chunk).await?;
                tx.flush().await?;
            }
        }
    }
}

/// Blocking front end to the listeners, for the simulation loop.
///
/// Every method blocks on the runtime and must not be called from inside it.
pub struct SyncUartManager {
    runtime: tokio::runtime::Handle,
    server: Arc<Mutex<UartServer>>,
    channels: HashMap<NodeAddr, PortChannels>,
    attached: Attached,
}

impl SyncUartManager {
    /// Create a manager whose listeners run on `runtime`.
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        let server = UartServer::default();
        let attached = server.attached.clone();
        SyncUartManager {
            runtime,
            server: Arc::new(Mutex::new(server)),
            channels: HashMap::new(),
            attached,
        }
    }

    fn with_server<R>(&self, f: impl FnOnce(&mut UartServer) -> R) -> R {
        let server = self.server.clone();
        self.runtime.block_on(async move { f(&mut *server.lock().await) })
    }

    /// Add a device to the node table, with a serial port if `port` is set.
    pub fn register_node(
        &mut self,
        address: NodeAddr,
        name: String,
        node_type: String,
        port: Option<u16>,
    ) {
        self.with_server(|server| {
            server.devices.push(UartNodeInfo {
                name,
                node_type,
                address,
                port,
            })
        });
    }

    /// Bind and start every registered serial port.
    pub fn start(&mut self) -> io::Result<()> {
        let server = self.server.clone();
        self.channels = self.runtime.block_on(async move {
            let mut server = server.lock().await;
            server.start().await?;
            io::Result::Ok(server.channels.clone())
        })?;
        Ok(())
    }

    /// A [`SerialPort`] for the device's TCP link, once started.
    pub fn serial_port(&self, address: NodeAddr) -> Option<UartPort> {
        let channels = self.channels.get(&address)?.clone();
        Some(UartPort {
            address,
            channels,
            attached: self.attached.clone(),
            pending: VecDeque::new(),
        })
    }

    /// Print the node table to stderr.
    pub fn print_node_table(&self) {
        self.with_server(|server| server.print_node_table());
    }

    /// Send bytes to the device's client; dropped when none is attached.
    pub fn send_to_client(&self, address: NodeAddr, data: &[u8]) {
        if let Some(channels) = self.channels.get(&address) {
            channels.offer(&self.attached, address, data);
        }
    }

    /// Next chunk the device's client sent, if any.
    pub fn try_recv_from_client(&self, address: NodeAddr) -> Option<Vec<u8>> {
        self.channels.get(&address)?.poll()
    }

    /// Registered devices, with bound ports once started.
    pub fn node_infos(&self) -> Vec<UartNodeInfo> {
        self.with_server(|server| server.devices.clone())
    }

    /// Whether a client is attached to the device's port.
    pub fn is_client_connected(&self, address: NodeAddr) -> bool {
        is_attached(&self.attached, address)
    }
}

/// A device serial port carried over TCP.
///
/// Reads return whatever the client has sent so far; writes are dropped while
/// no client is attached, as bytes on an unplugged cable would be.
pub struct UartPort {
    address: NodeAddr,
    channels: PortChannels,
    attached: Attached,
    pending: VecDeque<u8>,
}

impl UartPort {
    /// Whether a TCP client is attached.
    pub fn is_connected(&self) -> bool {
        is_attached(&self.attached, self.address)
    }
}

impl SerialPort for UartPort {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        while self.pending.len() < buf.len() {
            let Some(chunk) = self.channels.poll() else {
                break;
            };
            self.pending.extend(chunk);
        }
        let n = self.pending.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn write(&mut self, data: &[u8]) {
        self.channels.offer(&self.attached, self.address, data);
    }
}
