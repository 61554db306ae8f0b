//! Sensor/actuator node firmware.
//!
//! A node announces itself, receives its device list from the master,
//! adopts the session the master hands out and then serves state requests
//! and reports device changes:
//!
//! ```text
//! Booting --Booted sent--> Configuring --Configured--> Running
//!    ^                          |                         |
//!    +------ timeout -----------+------ Reset ------------+
//! ```
//!
//! Everything is driven by [`NodeFirmware::process`], one non-blocking step
//! per call.

use crate::config::NodeConfig;
use crate::registry::ItemRegistry;
use crate::FirmwareError;
use meshnet_common::{Clock, Hardware, Interval, MeshTransport};
use meshnet_metrics::metric_defs;
use meshnet_metrics::MetricLabels;
use meshnet_packet::{Envelope, MessageType, NodeAddr, MASTER_ADDR};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt;

// ============================================================================
// State
// ============================================================================

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// About to announce itself.
    Booting,
    /// Waiting for device records and a session from the master.
    Configuring,
    /// Serving the master under an agreed session.
    Running,
}

/// Why the node restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestartReason {
    /// The boot announcement could not be delivered.
    BootFailed,
    /// The master went quiet during configuration.
    ConfigureTimeout,
    /// The master sent `Reset`.
    ResetRequested,
    /// The outbound counter ran out within one session.
    CounterExhausted,
}

impl RestartReason {
    /// Short label used for logs and the `reason` metric label.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RestartReason::BootFailed => "boot_failed",
            RestartReason::ConfigureTimeout => "configure_timeout",
            RestartReason::ResetRequested => "reset",
            RestartReason::CounterExhausted => "counter_exhausted",
        }
    }
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session id and replay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    /// Session id stamped on every message.
    pub id: u16,
    /// Counter of the last message this node sent.
    pub own_counter: u16,
    /// Counter of the last message accepted from the master.
    pub peer_counter: u16,
}

impl Session {
    /// A fresh session with both counters at zero.
    pub fn new(id: u16) -> Self {
        Session {
            id,
            own_counter: 0,
            peer_counter: 0,
        }
    }

    /// The session a node uses until the master assigns one.
    ///
    /// Seeded from the microsecond clock mixed with the node address.
    pub fn provisional(micros: u32, addr: NodeAddr) -> Self {
        let seed = ((micros as u64) << 16) | addr as u64;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Session::new(rng.gen())
    }

    /// Advance and return the outbound counter, or `None` once it is exhausted.
    pub fn next_counter(&mut self) -> Option<u16> {
        self.own_counter = self.own_counter.checked_add(1)?;
        Some(self.own_counter)
    }
}

/// Header fields of a verified inbound message.
#[derive(Debug, Clone, Copy)]
struct Inbound {
    msg_type: MessageType,
    session: u16,
    counter: u16,
}

// ============================================================================
// Node Firmware
// ============================================================================

/// A node's complete runtime state.
pub struct NodeFirmware<T, H, C> {
    config: NodeConfig,
    labels: MetricLabels,
    transport: T,
    hardware: H,
    clock: C,
    state: NodeState,
    session: Session,
    registry: ItemRegistry,
    outbound: Envelope,
    inbound: Envelope,
    configure_timer: Interval,
    keepalive: Interval,
    poll: Interval,
    restarts: u32,
    last_restart: Option<RestartReason>,
}

impl<T: MeshTransport, H: Hardware, C: Clock> NodeFirmware<T, H, C> {
    /// Create a node in the `Booting` state.
    pub fn new(
        config: NodeConfig,
        transport: T,
        hardware: H,
        clock: C,
    ) -> Result<Self, FirmwareError> {
        config.validate()?;
        let now = clock.millis();
        Ok(NodeFirmware {
            labels: MetricLabels::node(config.name.clone()),
            registry: ItemRegistry::new(config.max_items),
            configure_timer: Interval::new(now, config.configure_timeout_ms),
            keepalive: Interval::new(now, config.keepalive_interval_ms),
            poll: Interval::new(now, config.poll_interval_ms),
            config,
            transport,
            hardware,
            clock,
            state: NodeState::Booting,
            session: Session::default(),
            outbound: Envelope::new(),
            inbound: Envelope::new(),
            restarts: 0,
            last_restart: None,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Node name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Mesh address.
    pub fn address(&self) -> NodeAddr {
        self.transport.address()
    }

    /// Configuration in use.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Current session.
    pub fn session(&self) -> Session {
        self.session
    }

    /// Configured devices.
    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    /// Number of restarts since creation.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Reason for the most recent restart.
    pub fn last_restart_reason(&self) -> Option<RestartReason> {
        self.last_restart
    }

    /// Uptime in whole seconds, truncated to 16 bits.
    pub fn uptime_secs(&self) -> u16 {
        (self.clock.millis() / 1000) as u16
    }

    // ========================================================================
    // Main Loop
    // ========================================================================

    /// Run one step of the state machine.
    pub fn process(&mut self) {
        self.transport.update();
        match self.state {
            NodeState::Booting => self.boot(),
            NodeState::Configuring => self.configure(),
            NodeState::Running => self.run(),
        }
    }

    /// Reinitialize everything and go back to `Booting`.
    pub fn restart(&mut self, reason: RestartReason) {
        log::warn!("[{}] restarting ({}) from {:?}", self.config.name, reason, self.state);
        metrics::counter!(
            metric_defs::NODE_RESTARTS.name,
            &self.labels.with(&[("reason", reason.as_str().to_string())])
        )
        .increment(1);

        self.registry.clear();
        metrics::gauge!(metric_defs::REGISTRY_ITEMS.name, &self.labels.to_labels()).set(0.0);
        self.session = Session::default();
        self.outbound.reset();
        self.inbound.reset();

        let now = self.clock.millis();
        self.configure_timer.restart(now);
        self.keepalive.restart(now);
        self.poll.restart(now);

        self.state = NodeState::Booting;
        self.restarts += 1;
        self.last_restart = Some(reason);
    }

    fn boot(&mut self) {
        self.session = Session::provisional(self.clock.micros(), self.transport.address());
        log::info!(
            "[{}] booting at {} with provisional session {:#06x}",
            self.config.name,
            self.transport.address(),
            self.session.id
        );

        if self.send_uptime(MessageType::Booted) {
            self.state = NodeState::Configuring;
            self.configure_timer.restart(self.clock.millis());
        } else if self.state == NodeState::Booting {
            self.restart(RestartReason::BootFailed);
        }
    }

    fn configure(&mut self) {
        let now = self.clock.millis();
        let Some(msg) = self.fetch() else {
            if self.configure_timer.expired(now) {
                self.restart(RestartReason::ConfigureTimeout);
            }
            return;
        };
        self.configure_timer.restart(now);

        match msg.msg_type {
            MessageType::Configure => {
                self.configure_item();
                self.send_uptime(MessageType::Pong);
            }
            MessageType::Configured => {
                let session_id = match self.inbound.get_short() {
                    Ok(id) => id,
                    Err(err) => {
                        log::warn!("[{}] malformed Configured: {}", self.config.name, err);
                        return;
                    }
                };
                self.send_uptime(MessageType::Pong);
                if self.state != NodeState::Configuring {
                    return;
                }

                self.session = Session::new(session_id);
                self.state = NodeState::Running;
                self.keepalive.restart(now);
                self.poll.restart(now);
                metrics::counter!(metric_defs::NODE_SESSIONS.name, &self.labels.to_labels())
                    .increment(1);
                log::info!(
                    "[{}] running with session {:#06x} and {} devices",
                    self.config.name,
                    session_id,
                    self.registry.len()
                );
            }
            other => {
                log::trace!("[{}] ignoring {} while configuring", self.config.name, other);
            }
        }
    }

    fn run(&mut self) {
        if let Some(msg) = self.fetch() {
            self.dispatch(msg);
            if self.state != NodeState::Running {
                return;
            }
        }

        let now = self.clock.millis();
        if self.keepalive.expired(now) {
            self.keepalive.restart(now);
            if self.send_uptime(MessageType::Pong) {
                metrics::counter!(metric_defs::NODE_KEEPALIVES_SENT.name, &self.labels.to_labels())
                    .increment(1);
            }
            if self.state != NodeState::Running {
                return;
            }
        }

        if self.registry.has_pending() {
            self.send_reading();
            return;
        }

        if self.poll.expired(now) {
            self.poll.restart(now);
            let flagged = self.registry.poll_changes(&mut self.hardware);
            if flagged > 0 {
                log::debug!("[{}] {} devices changed", self.config.name, flagged);
            }
        }
    }

    fn dispatch(&mut self, msg: Inbound) {
        if msg.session != self.session.id {
            self.reject("wrong_session");
            return;
        }
        if msg.msg_type == MessageType::Reset {
            log::info!("[{}] reset requested by master", self.config.name);
            self.restart(RestartReason::ResetRequested);
            return;
        }
        if msg.counter <= self.session.peer_counter {
            log::debug!(
                "[{}] replayed counter {} (last accepted {})",
                self.config.name,
                msg.counter,
                self.session.peer_counter
            );
            self.reject("replay");
            return;
        }
        self.session.peer_counter = msg.counter;

        match msg.msg_type {
            MessageType::SetState => {
                match self.registry.apply_state(&mut self.inbound, &mut self.hardware) {
                    Ok(id) => log::debug!("[{}] device {} updated", self.config.name, id),
                    Err(err) => log::warn!("[{}] SetState failed: {}", self.config.name, err),
                }
            }
            MessageType::GetState => {
                if let Err(err) = self.registry.mark_pending(&mut self.inbound) {
                    log::warn!("[{}] GetState failed: {}", self.config.name, err);
                }
            }
            MessageType::Ping => {
                self.send_uptime(MessageType::Pong);
            }
            MessageType::Configure => {
                self.configure_item();
                self.send_uptime(MessageType::Pong);
            }
            other => {
                log::trace!("[{}] ignoring {} while running", self.config.name, other);
            }
        }
    }

    // ========================================================================
    // Receive Path
    // ========================================================================

    /// Receive and verify one message from the master, leaving the cursor on its payload.
    fn fetch(&mut self) -> Option<Inbound> {
        if !self.transport.available() {
            return None;
        }
        self.inbound.reset();
        let header = self.transport.receive(self.inbound.buffer_mut())?;

        if header.from != MASTER_ADDR {
            log::debug!("[{}] dropping message from {}", self.config.name, header.from);
            self.reject("wrong_sender");
            return None;
        }
        let msg_type = match MessageType::try_from(header.msg_type) {
            Ok(t) => t,
            Err(_) => {
                log::debug!("[{}] unknown message type {}", self.config.name, header.msg_type);
                self.reject("unknown_type");
                return None;
            }
        };

        let to = self.transport.address();
        if let Err(err) = self
            .inbound
            .verify(&self.config.key, header.from, to, msg_type, header.len)
        {
            log::debug!("[{}] dropping {}: {}", self.config.name, msg_type, err);
            self.reject(err.reason());
            return None;
        }
        let (session, counter) = match self.inbound.read_header() {
            Ok(fields) => fields,
            Err(err) => {
                self.reject(err.reason());
                return None;
            }
        };
        log::trace!(
            "[{}] received {} session={:#06x} counter={}",
            self.config.name,
            msg_type,
            session,
            counter
        );

        Some(Inbound {
            msg_type,
            session,
            counter,
        })
    }

    fn reject(&self, reason: &'static str) {
        metrics::counter!(
            metric_defs::ENVELOPE_REJECTED.name,
            &self.labels.with(&[("reason", reason.to_string())])
        )
        .increment(1);
    }

    fn configure_item(&mut self) {
        match self.registry.configure(&mut self.inbound, &mut self.hardware) {
            Ok(id) => {
                log::info!("[{}] device {} configured", self.config.name, id);
                metrics::gauge!(metric_defs::REGISTRY_ITEMS.name, &self.labels.to_labels())
                    .set(self.registry.len() as f64);
            }
            Err(err) => {
                log::warn!("[{}] device configuration failed: {}", self.config.name, err);
                metrics::counter!(
                    metric_defs::REGISTRY_CONFIGURE_FAILURES.name,
                    &self.labels.with(&[("reason", err.reason().to_string())])
                )
                .increment(1);
            }
        }
    }

    // ========================================================================
    // Send Path
    // ========================================================================

    /// Start an outbound message under the current session.
    fn stamp(&mut self) -> bool {
        match self.session.next_counter() {
            Some(counter) => {
                self.outbound.init(self.session.id, counter);
                true
            }
            None => {
                log::warn!("[{}] outbound counter exhausted", self.config.name);
                self.restart(RestartReason::CounterExhausted);
                false
            }
        }
    }

    fn send_uptime(&mut self, msg_type: MessageType) -> bool {
        if !self.stamp() {
            return false;
        }
        let uptime = self.uptime_secs();
        if let Err(err) = self.outbound.set_short(uptime) {
            log::warn!("[{}] cannot write uptime: {}", self.config.name, err);
            return false;
        }
        self.transmit(msg_type)
    }

    fn send_reading(&mut self) {
        if !self.stamp() {
            return;
        }
        match self.registry.next_pending(&mut self.outbound, &mut self.hardware) {
            Ok(Some(id)) => {
                if self.transmit(MessageType::Reading) {
                    log::debug!("[{}] reported device {}", self.config.name, id);
                    metrics::counter!(
                        metric_defs::NODE_READINGS_SENT.name,
                        &self.labels.to_labels()
                    )
                    .increment(1);
                } else if let Err(err) = self.registry.mark_pending_id(id) {
                    log::warn!("[{}] cannot requeue device {}: {}", self.config.name, id, err);
                }
            }
            Ok(None) => {}
            Err(err) => log::warn!("[{}] cannot encode reading: {}", self.config.name, err),
        }
    }

    /// Seal the outbound envelope and hand it to the transport, retrying on failure.
    fn transmit(&mut self, msg_type: MessageType) -> bool {
        let from = self.transport.address();
        let len = self
            .outbound
            .finalize(&self.config.key, from, MASTER_ADDR, msg_type);
        log::trace!(
            "[{}] sending {} counter={} {}",
            self.config.name,
            msg_type,
            self.session.own_counter,
            hex::encode(self.outbound.as_bytes())
        );

        for attempt in 1..=self.config.send_attempts {
            if self
                .transport
                .send(MASTER_ADDR, msg_type.as_u8(), &self.outbound.as_bytes()[..len])
            {
                metrics::histogram!(metric_defs::NODE_SEND_ATTEMPTS.name, &self.labels.to_labels())
                    .record(attempt as f64);
                return true;
            }
            log::debug!("[{}] {} send attempt {} failed", self.config.name, msg_type, attempt);
            if !self.transport.check_connection() {
                self.transport.renew_address();
            }
        }

        log::warn!(
            "[{}] giving up on {} after {} attempts",
            self.config.name,
            msg_type,
            self.config.send_attempts
        );
        metrics::counter!(
            metric_defs::NODE_SEND_FAILURES.name,
            &self.labels.with(&[("msg_type", msg_type.as_str().to_string())])
        )
        .increment(1);
        false
    }
}

impl<T, H, C> fmt::Debug for NodeFirmware<T, H, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeFirmware")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .field("session", &self.session)
            .field("devices", &self.registry.len())
            .field("restarts", &self.restarts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshnet_common::sim::{ManualClock, SimHardware, SimMesh};
    use meshnet_packet::AuthKey;

    fn node(
        mesh: &SimMesh,
        clock: &ManualClock,
    ) -> NodeFirmware<meshnet_common::sim::SimTransport, SimHardware, ManualClock> {
        mesh.endpoint(MASTER_ADDR);
        NodeFirmware::new(
            NodeConfig::new("n1", AuthKey::default()),
            mesh.endpoint(1),
            SimHardware::new(),
            clock.clone(),
        )
        .unwrap()
    }

    #[test]
    fn test_session_counter_exhaustion() {
        let mut session = Session::new(7);
        assert_eq!(session.next_counter(), Some(1));
        session.own_counter = u16::MAX - 1;
        assert_eq!(session.next_counter(), Some(u16::MAX));
        assert_eq!(session.next_counter(), None);
        assert_eq!(session.own_counter, u16::MAX);
    }

    #[test]
    fn test_provisional_session_seeding() {
        assert_eq!(Session::provisional(1234, 1), Session::provisional(1234, 1));
        assert_eq!(Session::provisional(99, 3).own_counter, 0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mesh = SimMesh::new();
        let mut config = NodeConfig::default();
        config.send_attempts = 0;
        let result =
            NodeFirmware::new(config, mesh.endpoint(1), SimHardware::new(), ManualClock::new());
        assert!(matches!(result, Err(FirmwareError::Config(_))));
    }

    #[test]
    fn test_uptime_truncates_to_16_bits() {
        let mesh = SimMesh::new();
        let clock = ManualClock::starting_at(70_000_000);
        let node = node(&mesh, &clock);
        assert_eq!(node.uptime_secs(), (70_000u32 % 65_536) as u16);
    }

    #[test]
    fn test_counter_exhaustion_restarts() {
        let mesh = SimMesh::new();
        let clock = ManualClock::new();
        let mut node = node(&mesh, &clock);
        node.state = NodeState::Running;
        node.session = Session::new(42);
        node.session.own_counter = u16::MAX;

        assert!(!node.send_uptime(MessageType::Pong));
        assert_eq!(node.state(), NodeState::Booting);
        assert_eq!(node.last_restart_reason(), Some(RestartReason::CounterExhausted));
        assert_eq!(mesh.pending(MASTER_ADDR), 0);
    }

    #[test]
    fn test_restart_resets_everything() {
        let mesh = SimMesh::new();
        let clock = ManualClock::new();
        let mut node = node(&mesh, &clock);
        node.process();
        assert_eq!(node.state(), NodeState::Configuring);

        node.restart(RestartReason::ResetRequested);
        assert_eq!(node.state(), NodeState::Booting);
        assert_eq!(node.session(), Session::default());
        assert!(node.registry().is_empty());
        assert_eq!(node.restarts(), 1);
        assert_eq!(RestartReason::ResetRequested.to_string(), "reset");
    }
}
