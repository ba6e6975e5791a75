//! Engine errors and their taxonomy

use hwsync_client::HardwareError;
use hwsync_registry::RegistryError;
use hwsync_types::{NodeId, ParameterError, ProvisionTarget};
use std::fmt;
use thiserror::Error;

/// Why a node could not be reconciled in this pass
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Neither the profile nor the hardware yielded a boot MAC
    #[error("No bootable connection found for node {0}")]
    NoBootableConnectionFound(NodeId),

    /// The boot MAC is already registered for another node
    #[error("MAC {mac} of node {node_id} is already registered for node {owner}")]
    PortConflict {
        mac: String,
        node_id: NodeId,
        owner: NodeId,
    },

    /// The registry refused the provision state request
    #[error("Could not move node {node_id} to {target}: {source}")]
    StateTransition {
        node_id: NodeId,
        target: ProvisionTarget,
        source: RegistryError,
    },
}

/// Failure classes used as a log field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An endpoint could not be reached
    Connectivity,
    /// Worth retrying on the next pass
    Transient,
    /// A retry budget ran out
    RetriesExhausted,
    /// Needs operator attention; the node is skipped for this pass
    HardStop,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::Transient => "transient",
            ErrorKind::RetriesExhausted => "retries_exhausted",
            ErrorKind::HardStop => "hard_stop",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Hardware(HardwareError::Connection(_))
            | EngineError::Registry(RegistryError::Connection(_)) => ErrorKind::Connectivity,
            EngineError::Hardware(HardwareError::MaxRetriesExceeded { .. }) => {
                ErrorKind::RetriesExhausted
            }
            EngineError::StateTransition { .. }
            | EngineError::Hardware(HardwareError::Decode(_))
            | EngineError::Registry(RegistryError::Decode(_)) => ErrorKind::Transient,
            _ => ErrorKind::HardStop,
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
