//! # meshnet-firmware
//!
//! Firmware logic for MeshNet nodes and the master.
//!
//! - [`NodeFirmware`]: the sensor/actuator node state machine, owning its
//!   [`ItemRegistry`] of configured devices.
//! - [`MasterFirmware`]: the bridge between the mesh and the host serial link.
//!
//! Both are generic over the collaborator traits in `meshnet-common`, so the
//! same code runs against real peripherals or the in-memory simulation.
//!
//! ## Usage
//!
//! ```
//! use meshnet_common::sim::{ManualClock, SimHardware, SimMesh};
//! use meshnet_firmware::{NodeConfig, NodeFirmware, NodeState};
//! use meshnet_packet::{AuthKey, MASTER_ADDR};
//!
//! let mesh = SimMesh::new();
//! let _master = mesh.endpoint(MASTER_ADDR);
//! let mut node = NodeFirmware::new(
//!     NodeConfig::new("kitchen", AuthKey::default()),
//!     mesh.endpoint(1),
//!     SimHardware::new(),
//!     ManualClock::new(),
//! )?;
//!
//! node.process();
//! assert_eq!(node.state(), NodeState::Configuring);
//! assert_eq!(mesh.pending(MASTER_ADDR), 1);
//! # Ok::<(), meshnet_firmware::FirmwareError>(())
//! ```

pub mod config;
pub mod items;
pub mod master;
pub mod node;
pub mod registry;

mod error;

pub use config::{MasterConfig, NodeConfig};
pub use error::{FirmwareError, RegistryError};
pub use items::{Device, Item, ItemKind, MAX_ID_LEN, MAX_ITEMS};
pub use master::MasterFirmware;
pub use node::{NodeFirmware, NodeState, RestartReason, Session};
pub use registry::ItemRegistry;
