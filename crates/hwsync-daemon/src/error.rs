//! Error types for hwsyncd

use hwsync_client::HardwareError;
use hwsync_registry::RegistryError;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hardware Manager client error
    #[error("Hardware Manager error: {0}")]
    Client(#[from] HardwareError),

    /// Node Registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DaemonError {
    fn from(err: config::ConfigError) -> Self {
        DaemonError::Config(err.to_string())
    }
}

/// Result type for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
