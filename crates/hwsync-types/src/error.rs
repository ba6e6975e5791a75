//! Errors raised while interpreting node parameters

use thiserror::Error;

/// A node carries a parameter the reconciler cannot work with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// A parameter is present but malformed
    #[error("Invalid parameter value: {0}")]
    InvalidParameterValue(String),

    /// A required parameter is absent
    #[error("Missing parameter value: {0}")]
    MissingParameterValue(String),
}

/// Result type for parameter parsing
pub type ParameterResult<T> = Result<T, ParameterError>;
