//! # meshnet-runner
//!
//! Runs a MeshNet network in one process: a master and its nodes exchange
//! packets over an in-memory mesh, and the master's serial link is exposed
//! on a TCP port so a real host controller can drive the simulated network.
//!
//! - [`scenario`]: YAML scenario files.
//! - [`sim`]: the stepped simulation.
//! - [`uart_server`]: serial ports carried over TCP.

pub mod scenario;
pub mod sim;
pub mod uart_server;

mod error;

pub use error::RunnerError;
pub use scenario::{MasterSpec, NodeSpec, Scenario, DEFAULT_TICK_MS};
pub use sim::{SimNode, Simulation};
pub use uart_server::{SyncUartManager, UartNodeInfo, UartPort};
