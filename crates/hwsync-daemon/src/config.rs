//! Configuration for hwsyncd

use crate::error::{DaemonError, DaemonResult};
use hwsync_client::{ClientConfig, ServerErrorPolicy, RABBITMQ_CLIENTCERT_CONFLICT};
use hwsync_engine::EngineConfig;
use hwsync_registry::HttpRegistryConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Hardware Manager connection and retry tuning
    #[serde(default)]
    pub hardware_manager: HardwareManagerConfig,

    /// Node Registry connection
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Reconciliation loop
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Per-node behaviour
    #[serde(default)]
    pub engine: EngineConfig,

    /// Unenrolled hardware audit
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hardware Manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareManagerConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub allow_insecure_connections: bool,

    #[serde(default)]
    pub tls_cacert_file: Option<PathBuf>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_conflict_backoff")]
    pub conflict_backoff_secs: u64,

    #[serde(default = "default_one_sec")]
    pub retry_backoff_secs: u64,

    #[serde(default = "default_one_sec")]
    pub task_poll_interval_secs: u64,

    #[serde(default = "default_task_max_wait")]
    pub task_max_wait_secs: u64,

    #[serde(default = "default_assignment_poll_interval")]
    pub assignment_poll_interval_secs: u64,

    #[serde(default)]
    pub server_error_policy: ServerErrorPolicy,

    /// 409 error codes treated as success
    #[serde(default = "default_benign_conflicts")]
    pub benign_conflicts: Vec<String>,
}

impl Default for HardwareManagerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            allow_insecure_connections: false,
            tls_cacert_file: None,
            api_version: default_api_version(),
            max_retries: default_max_retries(),
            conflict_backoff_secs: default_conflict_backoff(),
            retry_backoff_secs: default_one_sec(),
            task_poll_interval_secs: default_one_sec(),
            task_max_wait_secs: default_task_max_wait(),
            assignment_poll_interval_secs: default_assignment_poll_interval(),
            server_error_policy: ServerErrorPolicy::default(),
            benign_conflicts: default_benign_conflicts(),
        }
    }
}

impl HardwareManagerConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            allow_insecure_connections: self.allow_insecure_connections,
            tls_cacert_file: self.tls_cacert_file.clone(),
            api_version: self.api_version.clone(),
            max_retries: self.max_retries,
            conflict_backoff: Duration::from_secs(self.conflict_backoff_secs),
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            task_poll_interval: Duration::from_secs(self.task_poll_interval_secs),
            task_max_wait: Duration::from_secs(self.task_max_wait_secs),
            assignment_poll_interval: Duration::from_secs(self.assignment_poll_interval_secs),
            server_error_policy: self.server_error_policy,
            benign_conflicts: self.benign_conflicts.clone(),
            ..ClientConfig::default()
        }
    }
}

/// Node Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_url")]
    pub url: String,

    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_registry_api_version")]
    pub api_version: String,

    #[serde(default)]
    pub insecure: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            auth_token: None,
            api_version: default_registry_api_version(),
            insecure: false,
        }
    }
}

impl RegistryConfig {
    pub fn http_config(&self) -> HttpRegistryConfig {
        HttpRegistryConfig {
            url: self.url.clone(),
            auth_token: self.auth_token.clone(),
            api_version: self.api_version.clone(),
            insecure: self.insecure,
            ..HttpRegistryConfig::default()
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay between passes in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Nodes processed concurrently
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Delay after a pass that failed as a whole
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// Time an in-flight pass gets to finish on shutdown
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_workers: default_max_workers(),
            retry_interval_secs: default_retry_interval(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Inventory audit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Profile templates whose matching hardware should be enrolled
    #[serde(default)]
    pub profile_templates: Vec<String>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: default_check_interval(),
            profile_templates: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_api_version() -> String {
    "200".to_string()
}

fn default_max_retries() -> u32 {
    50
}

fn default_conflict_backoff() -> u64 {
    10
}

fn default_one_sec() -> u64 {
    1
}

fn default_task_max_wait() -> u64 {
    10
}

fn default_assignment_poll_interval() -> u64 {
    5
}

fn default_benign_conflicts() -> Vec<String> {
    vec![RABBITMQ_CLIENTCERT_CONFLICT.to_string()]
}

fn default_registry_url() -> String {
    "http://127.0.0.1:6385".to_string()
}

fn default_registry_api_version() -> String {
    "1.22".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_workers() -> usize {
    20
}

fn default_retry_interval() -> u64 {
    30
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_check_interval() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the file at `path`, then
    /// `HWSYNC_`-prefixed environment variables with `__` between sections
    /// (`HWSYNC_HARDWARE_MANAGER__URL`)
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("HWSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject settings the daemon cannot run with
    pub fn validate(&self) -> DaemonResult<()> {
        if self.hardware_manager.url.trim().is_empty() {
            return Err(DaemonError::Config(
                "hardware_manager.url must be set".to_string(),
            ));
        }
        if self.scheduler.max_workers == 0 {
            return Err(DaemonError::Config(
                "scheduler.max_workers must be positive".to_string(),
            ));
        }
        if self.scheduler.poll_interval_secs == 0 {
            return Err(DaemonError::Config(
                "scheduler.poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.inventory.enabled && self.inventory.check_interval_secs == 0 {
            return Err(DaemonError::Config(
                "inventory.check_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
