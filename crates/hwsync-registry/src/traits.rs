//! Node Registry trait

use crate::error::RegistryResult;
use async_trait::async_trait;
use hwsync_types::{Node, NodeId, Port, PortId, ProvisionTarget};
use serde_json::{Map, Value};

/// Operations hwsync needs from the Node Registry
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// List all nodes with full detail
    async fn list_nodes(&self) -> RegistryResult<Vec<Node>>;

    /// Get a node by ID
    async fn get_node(&self, id: &NodeId) -> RegistryResult<Node>;

    /// Request a provision state transition
    async fn set_provision_state(
        &self,
        node_id: &NodeId,
        target: ProvisionTarget,
    ) -> RegistryResult<()>;

    /// Register a MAC address for a node
    async fn create_port(
        &self,
        node_id: &NodeId,
        mac: &str,
        local_link_connection: Option<Map<String, Value>>,
    ) -> RegistryResult<Port>;

    /// Ports carrying this MAC address
    async fn list_ports_by_mac(&self, mac: &str) -> RegistryResult<Vec<Port>>;

    /// Get a port by ID
    async fn get_port(&self, id: &PortId) -> RegistryResult<Port>;
}
