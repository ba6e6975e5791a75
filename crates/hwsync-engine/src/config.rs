//! Engine settings

use hwsync_types::{Node, NodeId};
use serde::{Deserialize, Serialize};

/// Settings for [`ReconciliationEngine`](crate::ReconciliationEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Drivers whose nodes hwsync manages
    pub supported_drivers: Vec<String>,

    /// Send manageable nodes with missing properties to `inspect`
    pub inspection_enabled: bool,

    /// Hardware properties a node needs before it is provided
    pub required_properties: Vec<String>,

    /// Profile names are `"{prefix} [{node_id}]"`
    pub profile_name_prefix: String,

    /// Substring of `last_error` meaning inspection failed on claimed hardware
    pub claimed_marker: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            supported_drivers: default_supported_drivers(),
            inspection_enabled: false,
            required_properties: default_required_properties(),
            profile_name_prefix: "Ironic".to_string(),
            claimed_marker: "already in use by OneView".to_string(),
        }
    }
}

fn default_supported_drivers() -> Vec<String> {
    ["agent_pxe_oneview", "iscsi_pxe_oneview", "fake_oneview"]
        .iter()
        .map(|d| d.to_string())
        .collect()
}

fn default_required_properties() -> Vec<String> {
    ["memory_mb", "cpus", "local_gb", "cpu_arch"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl EngineConfig {
    pub fn supports_driver(&self, driver: &str) -> bool {
        self.supported_drivers.iter().any(|d| d == driver)
    }

    /// Whether `node` belongs to hwsync at all: supported driver and not in
    /// maintenance
    pub fn manages(&self, node: &Node) -> bool {
        !node.maintenance && self.supports_driver(&node.driver)
    }

    pub fn profile_name(&self, node_id: &NodeId) -> String {
        format!("{} [{}]", self.profile_name_prefix, node_id)
    }
}
