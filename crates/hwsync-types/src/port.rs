//! Registry ports

use crate::ids::{NodeId, PortId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A MAC address registered for a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    #[serde(rename = "uuid")]
    pub id: PortId,

    #[serde(rename = "node_uuid")]
    pub node_id: NodeId,

    /// MAC address
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_link_connection: Option<Map<String, Value>>,
}

impl Port {
    /// Whether this port's address matches `mac`, ignoring case
    pub fn has_address(&self, mac: &str) -> bool {
        self.address.eq_ignore_ascii_case(mac)
    }
}
