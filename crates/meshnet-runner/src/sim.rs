//! The simulated network: one master and its nodes on a shared mesh.

use crate::scenario::Scenario;
use crate::RunnerError;
use meshnet_common::sim::{SimHardware, SimMesh, SimTransport};
use meshnet_common::{Clock, SerialPort};
use meshnet_firmware::{MasterFirmware, NodeFirmware, NodeState};
use meshnet_packet::{NodeAddr, MASTER_ADDR};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A simulated node and its pin bank.
pub struct SimNode<C> {
    /// Node firmware.
    pub firmware: NodeFirmware<SimTransport, SimHardware, C>,
    /// Shared handle to the node's pins.
    pub hardware: SimHardware,
}

/// Every device of a scenario, stepped together.
pub struct Simulation<S, C> {
    mesh: SimMesh,
    master: MasterFirmware<SimTransport, S>,
    nodes: Vec<SimNode<C>>,
    ticks: u64,
}

impl<S: SerialPort, C: Clock + Clone> Simulation<S, C> {
    /// Build the network described by `scenario`, with the master's host link on `serial`.
    pub fn new(scenario: &Scenario, serial: S, clock: C) -> Result<Self, RunnerError> {
        scenario.validate()?;
        let mesh = SimMesh::new();
        let master = MasterFirmware::new(
            scenario.master_config(),
            mesh.endpoint(MASTER_ADDR),
            serial,
        );

        let mut nodes = Vec::with_capacity(scenario.nodes.len());
        for spec in &scenario.nodes {
            let hardware = SimHardware::new();
            for (&pin, &level) in &spec.inputs {
                hardware.set_digital(pin, level);
            }
            for (&pin, &value) in &spec.analog_inputs {
                hardware.set_analog(pin, value);
            }
            let firmware = NodeFirmware::new(
                scenario.node_config(spec),
                mesh.endpoint(spec.address),
                hardware.clone(),
                clock.clone(),
            )?;
            tracing::debug!("node {} at address {}", spec.name, spec.address);
            nodes.push(SimNode { firmware, hardware });
        }

        Ok(Simulation {
            mesh,
            master,
            nodes,
            ticks: 0,
        })
    }

    /// Advance every device by one step: the master, then each node in scenario order.
    pub fn step(&mut self) {
        self.master.process();
        for node in &mut self.nodes {
            node.firmware.process();
        }
        self.ticks += 1;
    }

    /// Steps taken so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The shared mesh.
    pub fn mesh(&self) -> &SimMesh {
        &self.mesh
    }

    /// The master.
    pub fn master(&self) -> &MasterFirmware<SimTransport, S> {
        &self.master
    }

    /// All nodes in scenario order.
    pub fn nodes(&self) -> &[SimNode<C>] {
        &self.nodes
    }

    /// The node at `address`.
    pub fn node(&self, address: NodeAddr) -> Option<&SimNode<C>> {
        self.nodes.iter().find(|n| n.firmware.address() == address)
    }

    /// Number of nodes in the `Running` state.
    pub fn running_nodes(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.firmware.state() == NodeState::Running)
            .count()
    }

    /// Step every `tick` until `stop` is set or `duration` has passed.
    pub fn run(&mut self, tick: Duration, duration: Option<Duration>, stop: &AtomicBool) {
        let started = Instant::now();
        while !stop.load(Ordering::SeqCst) {
            if duration.is_some_and(|d| started.elapsed() >= d) {
                break;
            }
            self.step();
            std::thread::sleep(tick);
        }
        tracing::info!(
            "simulation stopped after {} ticks, {}/{} nodes running",
            self.ticks,
            self.running_nodes(),
            self.nodes.len()
        );
    }
}
