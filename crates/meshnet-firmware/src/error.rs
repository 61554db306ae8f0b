//! Error types for meshnet-firmware.

use meshnet_packet::PacketError;
use thiserror::Error;

/// Errors from the device registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No free device slot.
    #[error("Registry full ({max} devices)")]
    RegistryFull {
        /// Configured device limit.
        max: usize,
    },

    /// The configuration record names an unknown device variant.
    #[error("Unknown device variant: {0}")]
    UnknownVariant(u8),

    /// A state message names a device that was never configured.
    #[error("Unknown device id: {0}")]
    UnknownDeviceId(u8),

    /// The record ended before all of its fields were read.
    #[error("Malformed device record: {0}")]
    Decode(#[from] PacketError),
}

impl RegistryError {
    /// Short label used for the `reason` metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            RegistryError::RegistryFull { .. } => "registry_full",
            RegistryError::UnknownVariant(_) => "unknown_variant",
            RegistryError::UnknownDeviceId(_) => "unknown_device",
            RegistryError::Decode(_) => "decode",
        }
    }
}

/// Errors from building firmware.
///
/// Once running, the firmware logs and counts bad packets instead of
/// returning them.
#[derive(Debug, Error)]
pub enum FirmwareError {
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl FirmwareError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        FirmwareError::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::RegistryFull { max: 16 };
        assert_eq!(err.to_string(), "Registry full (16 devices)");
        assert_eq!(err.reason(), "registry_full");

        let err = FirmwareError::config("send_attempts must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: send_attempts must be at least 1"
        );
    }

    #[test]
    fn test_decode_from_packet_error() {
        let err: RegistryError = PacketError::overrun(5, 1, 5).into();
        assert_eq!(err.reason(), "decode");
    }
}
