//! Error types for meshnet-runner.

use meshnet_firmware::FirmwareError;
use thiserror::Error;

/// Errors that can occur while loading or running a simulation.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// File or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Scenario file is not valid YAML for a scenario.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Firmware could not be built.
    #[error("Firmware error: {0}")]
    Firmware(#[from] FirmwareError),

    /// Scenario content is inconsistent.
    #[error("Invalid scenario: {0}")]
    Scenario(String),

    /// The Ctrl-C handler could not be installed.
    #[error("Signal handler error: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl RunnerError {
    /// Create a scenario error.
    pub fn scenario(message: impl Into<String>) -> Self {
        RunnerError::Scenario(message.into())
    }
}
