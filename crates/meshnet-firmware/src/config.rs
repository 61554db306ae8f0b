//! Firmware configuration.

use crate::items::MAX_ITEMS;
use crate::FirmwareError;
use meshnet_packet::AuthKey;
use serde::{Deserialize, Serialize};

// ============================================================================
// Node Configuration
// ============================================================================

/// Sensor/actuator node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Name used in logs and metric labels.
    pub name: String,
    /// Network pre-shared key.
    pub key: AuthKey,
    /// Time between keepalive pongs while running.
    pub keepalive_interval_ms: u32,
    /// Silence from the master after which configuration is abandoned.
    pub configure_timeout_ms: u32,
    /// Time between device change scans.
    pub poll_interval_ms: u32,
    /// Transport attempts per application send.
    pub send_attempts: u8,
    /// Device slots available to the master.
    pub max_items: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            name: "node".to_string(),
            key: AuthKey::default(),
            keepalive_interval_ms: 10_000,
            configure_timeout_ms: 15_000,
            poll_interval_ms: 100,
            send_attempts: 3,
            max_items: MAX_ITEMS,
        }
    }
}

impl NodeConfig {
    /// Create a configuration with defaults for everything but name and key.
    pub fn new(name: impl Into<String>, key: AuthKey) -> Self {
        NodeConfig {
            name: name.into(),
            key,
            ..Default::default()
        }
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), FirmwareError> {
        if self.send_attempts == 0 {
            return Err(FirmwareError::config("send_attempts must be at least 1"));
        }
        if self.max_items == 0 || self.max_items > MAX_ITEMS {
            return Err(FirmwareError::config(format!(
                "max_items must be between 1 and {}, got {}",
                MAX_ITEMS, self.max_items
            )));
        }
        if self.keepalive_interval_ms == 0 || self.configure_timeout_ms == 0 {
            return Err(FirmwareError::config("intervals must be non-zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Master Configuration
// ============================================================================

/// Master configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Name used in logs and metric labels.
    pub name: String,
    /// Network pre-shared key.
    pub key: AuthKey,
    /// Drop mesh packets whose tag does not verify instead of forwarding them.
    pub verify_uplink: bool,
}

impl Default for MasterConfig {
    fn default() -> Self {
        MasterConfig {
            name: "master".to_string(),
            key: AuthKey::default(),
            verify_uplink: true,
        }
    }
}

impl MasterConfig {
    /// Create a configuration with the given key.
    pub fn new(key: AuthKey) -> Self {
        MasterConfig {
            key,
            ..Default::default()
        }
    }
}
