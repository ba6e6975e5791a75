//! Error types for the Hardware Manager client

use thiserror::Error;

/// Failures talking to the Hardware Manager
#[derive(Debug, Clone, Error)]
pub enum HardwareError {
    /// The Hardware Manager could not be reached at all
    #[error("Can't connect to Hardware Manager: {0}")]
    Connection(String),

    /// Login was rejected or returned no session
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// The retry budget ran out
    #[error("Maximum retries exceeded ({attempts}) for {uri}")]
    MaxRetriesExceeded { uri: String, attempts: u32 },

    /// 404/500 under the fail-fast policy
    #[error("Hardware Manager returned {status}: {body}")]
    Server { status: u16, body: String },

    /// A resource came back without a `uri`
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// No profile template reference was given or it does not exist
    #[error("Profile template not found: {0}")]
    TemplateNotFound(String),

    /// The clone request was not accepted as a task
    #[error("Profile clone failed: {0}")]
    ProfileCloneFailed(String),

    /// An asynchronous task reported errors
    #[error("Task {task_uri} failed: {}", .errors.join("; "))]
    TaskFailed { task_uri: String, errors: Vec<String> },

    /// A response did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Client could not be built from its configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HardwareError {
    /// Whether this is a connectivity failure
    pub fn is_connection(&self) -> bool {
        matches!(self, HardwareError::Connection(_))
    }
}

/// Result type for Hardware Manager operations
pub type HardwareResult<T> = Result<T, HardwareError>;
