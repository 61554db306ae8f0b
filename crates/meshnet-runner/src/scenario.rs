//! Scenario files.
//!
//! A scenario names the shared key, the master settings and every node with
//! its address, initial input levels and optional firmware overrides:
//!
//! ```yaml
//! key: "000102030405060708090a0b0c0d0e0f"
//! master: { name: master }
//! tick_ms: 10
//! nodes:
//!   - name: kitchen
//!     address: 1
//!     inputs: { 4: true }
//!     analog_inputs: { 14: 512 }
//!     config: { keepalive_interval_ms: 5000 }
//! ```

use crate::RunnerError;
use meshnet_firmware::{MasterConfig, NodeConfig};
use meshnet_packet::{AuthKey, NodeAddr, MASTER_ADDR};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Default loop period.
pub const DEFAULT_TICK_MS: u64 = 10;

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}

/// Master settings in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterSpec {
    /// Name used in logs and the node table.
    pub name: String,
    /// Withhold unauthenticated uplink packets from the host.
    pub verify_uplink: bool,
}

impl Default for MasterSpec {
    fn default() -> Self {
        let defaults = MasterConfig::default();
        MasterSpec {
            name: defaults.name,
            verify_uplink: defaults.verify_uplink,
        }
    }
}

/// One node in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Node name.
    pub name: String,
    /// Mesh address; must not be the master's.
    pub address: NodeAddr,
    /// Initial digital input levels by pin.
    #[serde(default)]
    pub inputs: BTreeMap<u8, bool>,
    /// Initial analog input values by pin.
    #[serde(default)]
    pub analog_inputs: BTreeMap<u8, u16>,
    /// Firmware overrides. `name` and `key` are always taken from the scenario.
    #[serde(default)]
    pub config: NodeConfig,
}

/// A complete simulation scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Network pre-shared key.
    pub key: AuthKey,
    /// Master settings.
    #[serde(default)]
    pub master: MasterSpec,
    /// Loop period in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Nodes in the mesh.
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

impl Scenario {
    /// Load and validate a scenario file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RunnerError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse and validate a scenario.
    pub fn from_yaml(text: &str) -> Result<Self, RunnerError> {
        let scenario: Scenario = serde_yaml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check addresses, names and per-node settings.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.tick_ms == 0 {
            return Err(RunnerError::scenario("tick_ms must be non-zero"));
        }
        let mut addresses = HashSet::new();
        let mut names = HashSet::new();
        for node in &self.nodes {
            if node.address == MASTER_ADDR {
                return Err(RunnerError::scenario(format!(
                    "node '{}' uses the master address {}",
                    node.name, MASTER_ADDR
                )));
            }
            if !addresses.insert(node.address) {
                return Err(RunnerError::scenario(format!(
                    "address {} is used by more than one node",
                    node.address
                )));
            }
            if !names.insert(node.name.as_str()) {
                return Err(RunnerError::scenario(format!(
                    "node name '{}' is used more than once",
                    node.name
                )));
            }
            self.node_config(node).validate()?;
        }
        Ok(())
    }

    /// Firmware configuration for the master.
    pub fn master_config(&self) -> MasterConfig {
        MasterConfig {
            name: self.master.name.clone(),
            key: self.key,
            verify_uplink: self.master.verify_uplink,
        }
    }

    /// Firmware configuration for `node`, with the scenario's name and key.
    pub fn node_config(&self, node: &NodeSpec) -> NodeConfig {
        NodeConfig {
            name: node.name.clone(),
            key: self.key,
            ..node.config.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
key: "000102030405060708090a0b0c0d0e0f"
tick_ms: 5
nodes:
  - name: kitchen
    address: 1
    inputs: { 4: true }
    analog_inputs: { 14: 512 }
    config: { keepalive_interval_ms: 5000 }
  - name: porch
    address: 2
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        assert_eq!(scenario.tick_ms, 5);
        assert_eq!(scenario.master.name, "master");
        assert!(scenario.master.verify_uplink);
        assert_eq!(scenario.nodes.len(), 2);

        let kitchen = &scenario.nodes[0];
        assert_eq!(kitchen.inputs.get(&4), Some(&true));
        assert_eq!(kitchen.analog_inputs.get(&14), Some(&512));

        let config = scenario.node_config(kitchen);
        assert_eq!(config.name, "kitchen");
        assert_eq!(config.key, scenario.key);
        assert_eq!(config.keepalive_interval_ms, 5000);
        assert_eq!(config.poll_interval_ms, 100);

        let porch = scenario.node_config(&scenario.nodes[1]);
        assert_eq!(porch.keepalive_interval_ms, 10_000);
    }

    #[test]
    fn test_default_tick() {
        let scenario = Scenario::from_yaml("key: \"000102030405060708090a0b0c0d0e0f\"\n").unwrap();
        assert_eq!(scenario.tick_ms, DEFAULT_TICK_MS);
        assert!(scenario.nodes.is_empty());
    }

    #[test]
    fn test_rejects_master_address() {
        let yaml = r#"
key: "000102030405060708090a0b0c0d0e0f"
nodes:
  - { name: a, address: 0 }
"#;
        assert!(matches!(Scenario::from_yaml(yaml), Err(RunnerError::Scenario(_))));
    }

    #[test]
    fn test_rejects_duplicate_address() {
        let yaml = r#"
key: "000102030405060708090a0b0c0d0e0f"
nodes:
  - { name: a, address: 3 }
  - { name: b, address: 3 }
"#;
        assert!(matches!(Scenario::from_yaml(yaml), Err(RunnerError::Scenario(_))));
    }

    #[test]
    fn test_rejects_bad_node_config() {
        let yaml = r#"
key: "000102030405060708090a0b0c0d0e0f"
nodes:
  - { name: a, address: 3, config: { send_attempts: 0 } }
"#;
        assert!(matches!(Scenario::from_yaml(yaml), Err(RunnerError::Firmware(_))));
    }

    #[test]
    fn test_rejects_bad_key() {
        let yaml = "key: \"00\"\n";
        assert!(matches!(Scenario::from_yaml(yaml), Err(RunnerError::Yaml(_))));
    }
}
