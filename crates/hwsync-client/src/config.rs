//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Error code of the one 409 the Hardware Manager returns for an
/// already-present messaging certificate
pub const RABBITMQ_CLIENTCERT_CONFLICT: &str = "RABBITMQ_CLIENTCERT_CONFLICT";

/// What to do with 404 and 500 responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerErrorPolicy {
    /// Log and retry within the retry budget
    #[default]
    Retry,
    /// Return `HardwareError::Server` immediately
    FailFast,
}

/// Settings for [`crate::HardwareClient`] and [`crate::HardwareGateway`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Hardware Manager, e.g. `https://oneview.example`
    pub url: String,
    pub username: String,
    pub password: String,
    /// Skip TLS certificate verification
    pub allow_insecure_connections: bool,
    /// Extra PEM CA bundle to trust
    pub tls_cacert_file: Option<PathBuf>,
    /// Default `X-Api-Version` header
    pub api_version: String,
    pub max_retries: u32,
    /// Sleep after a non-benign 409
    pub conflict_backoff: Duration,
    /// Sleep after a malformed body or a retried 404/500
    pub retry_backoff: Duration,
    pub task_poll_interval: Duration,
    pub task_max_wait: Duration,
    /// Sleep between hardware state polls while a profile is applied or removed
    pub assignment_poll_interval: Duration,
    pub server_error_policy: ServerErrorPolicy,
    /// 409 error codes treated as success
    pub benign_conflicts: Vec<String>,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            allow_insecure_connections: false,
            tls_cacert_file: None,
            api_version: "200".to_string(),
            max_retries: 50,
            conflict_backoff: Duration::from_secs(10),
            retry_backoff: Duration::from_secs(1),
            task_poll_interval: Duration::from_secs(1),
            task_max_wait: Duration::from_secs(10),
            assignment_poll_interval: Duration::from_secs(5),
            server_error_policy: ServerErrorPolicy::Retry,
            benign_conflicts: vec![RABBITMQ_CLIENTCERT_CONFLICT.to_string()],
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    /// Config with credentials and default tuning
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Same config with every sleep set to zero, for tests and dry runs
    pub fn without_delays(mut self) -> Self {
        self.conflict_backoff = Duration::ZERO;
        self.retry_backoff = Duration::ZERO;
        self.task_poll_interval = Duration::ZERO;
        self.assignment_poll_interval = Duration::ZERO;
        self
    }

    pub fn is_benign_conflict(&self, error_code: &str) -> bool {
        self.benign_conflicts.iter().any(|c| c == error_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_retries, 50);
        assert_eq!(config.api_version, "200");
        assert_eq!(config.conflict_backoff, Duration::from_secs(10));
        assert_eq!(config.server_error_policy, ServerErrorPolicy::Retry);
        assert!(config.is_benign_conflict(RABBITMQ_CLIENTCERT_CONFLICT));
        assert!(!config.is_benign_conflict("RESOURCE_LOCKED"));
    }

    #[test]
    fn test_server_error_policy_names() {
        let policy: ServerErrorPolicy = serde_json::from_str("\"fail_fast\"").unwrap();
        assert_eq!(policy, ServerErrorPolicy::FailFast);
    }
}
