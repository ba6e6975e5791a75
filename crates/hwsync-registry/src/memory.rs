//! In-memory Node Registry for dry runs and tests

use crate::error::{RegistryError, RegistryResult};
use crate::traits::NodeRegistry;
use async_trait::async_trait;
use hwsync_types::{Node, NodeId, Port, PortId, ProvisionTarget};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A provision state request recorded by [`InMemoryRegistry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub node_id: NodeId,
    pub target: ProvisionTarget,
}

/// In-memory registry
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    nodes: Arc<RwLock<HashMap<NodeId, Node>>>,
    ports: Arc<RwLock<HashMap<PortId, Port>>>,
    transitions: Arc<RwLock<Vec<Transition>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a node
    pub async fn upsert_node(&self, node: Node) {
        let mut nodes = self.nodes.write().await;
        nodes.insert(node.id.clone(), node);
    }

    /// Insert a port as-is
    pub async fn upsert_port(&self, port: Port) {
        let mut ports = self.ports.write().await;
        ports.insert(port.id.clone(), port);
    }

    /// All ports, in no particular order
    pub async fn ports(&self) -> Vec<Port> {
        let ports = self.ports.read().await;
        ports.values().cloned().collect()
    }

    /// Every provision state request, oldest first
    pub async fn transitions(&self) -> Vec<Transition> {
        self.transitions.read().await.clone()
    }
}

#[async_trait]
impl NodeRegistry for InMemoryRegistry {
    async fn list_nodes(&self) -> RegistryResult<Vec<Node>> {
        let nodes = self.nodes.read().await;
        let mut listed: Vec<Node> = nodes.values().cloned().collect();
        listed.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listed)
    }

    async fn get_node(&self, id: &NodeId) -> RegistryResult<Node> {
        let nodes = self.nodes.read().await;
        nodes
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("node {}", id)))
    }

    async fn set_provision_state(
        &self,
        node_id: &NodeId,
        target: ProvisionTarget,
    ) -> RegistryResult<()> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .get_mut(node_id)
            .ok_or_else(|| RegistryError::NotFound(format!("node {}", node_id)))?;
        node.provision_state = target.resulting_state();

        self.transitions.write().await.push(Transition {
            node_id: node_id.clone(),
            target,
        });
        Ok(())
    }

    async fn create_port(
        &self,
        node_id: &NodeId,
        mac: &str,
        local_link_connection: Option<Map<String, Value>>,
    ) -> RegistryResult<Port> {
        if !self.nodes.read().await.contains_key(node_id) {
            return Err(RegistryError::NotFound(format!("node {}", node_id)));
        }

        let mut ports = self.ports.write().await;
        if ports.values().any(|p| p.has_address(mac)) {
            return Err(RegistryError::Conflict(format!(
                "A port with MAC address {} already exists",
                mac
            )));
        }

        let port = Port {
            id: PortId::new(Uuid::new_v4().to_string()),
            node_id: node_id.clone(),
            address: mac.to_string(),
            local_link_connection,
        };
        ports.insert(port.id.clone(), port.clone());
        Ok(port)
    }

    async fn list_ports_by_mac(&self, mac: &str) -> RegistryResult<Vec<Port>> {
        let ports = self.ports.read().await;
        Ok(ports.values().filter(|p| p.has_address(mac)).cloned().collect())
    }

    async fn get_port(&self, id: &PortId) -> RegistryResult<Port> {
        let ports = self.ports.read().await;
        ports
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("port {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwsync_types::ProvisionState;

    fn node(id: &str) -> Node {
        Node::new(id, "fake_oneview", ProvisionState::Enroll)
    }

    #[tokio::test]
    async fn test_set_provision_state_records_transition() {
        let registry = InMemoryRegistry::new();
        registry.upsert_node(node("n1")).await;

        registry
            .set_provision_state(&NodeId::from("n1"), ProvisionTarget::Manage)
            .await
            .unwrap();

        let updated = registry.get_node(&NodeId::from("n1")).await.unwrap();
        assert_eq!(updated.provision_state, ProvisionState::Manageable);
        assert_eq!(
            registry.transitions().await,
            vec![Transition {
                node_id: NodeId::from("n1"),
                target: ProvisionTarget::Manage
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_node() {
        let registry = InMemoryRegistry::new();
        assert!(matches!(
            registry
                .set_provision_state(&NodeId::from("ghost"), ProvisionTarget::Provide)
                .await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry
                .create_port(&NodeId::from("ghost"), "01:23:45:67:89:ab", None)
                .await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_port_mac_is_unique_case_insensitive() {
        let registry = InMemoryRegistry::new();
        registry.upsert_node(node("n1")).await;
        registry.upsert_node(node("n2")).await;

        let port = registry
            .create_port(&NodeId::from("n1"), "01:23:45:67:89:AB", None)
            .await
            .unwrap();
        assert!(matches!(
            registry
                .create_port(&NodeId::from("n2"), "01:23:45:67:89:ab", None)
                .await,
            Err(RegistryError::Conflict(_))
        ));

        let found = registry.list_ports_by_mac("01:23:45:67:89:ab").await.unwrap();
        assert_eq!(found, vec![port.clone()]);
        assert_eq!(registry.get_port(&port.id).await.unwrap().node_id.as_str(), "n1");
    }

    #[tokio::test]
    async fn test_list_nodes_sorted() {
        let registry = InMemoryRegistry::new();
        registry.upsert_node(node("b")).await;
        registry.upsert_node(node("a")).await;

        let ids: Vec<String> = registry
            .list_nodes()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
