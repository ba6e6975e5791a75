//! Error types for Node Registry access

use thiserror::Error;

/// Node Registry errors
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Node or port does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (e.g. a port with this MAC already exists)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Registry unreachable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Any other non-success response
    #[error("Registry returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
