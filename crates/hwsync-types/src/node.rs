//! Node types as exposed by the Node Registry
//!
//! A Node is owned by the registry. hwsync only reads it and asks the registry
//! to move it between provision states.

use crate::error::{ParameterError, ParameterResult};
use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Key in `properties` holding the encoded capability string
pub const CAPABILITIES_KEY: &str = "capabilities";

/// Key in `driver_info` holding the dynamic allocation flag
pub const DYNAMIC_ALLOCATION_KEY: &str = "dynamic_allocation";

/// A bare-metal node record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Registry identity
    #[serde(rename = "uuid")]
    pub id: NodeId,

    /// Human readable name
    #[serde(default)]
    pub name: Option<String>,

    /// Current provision state
    pub provision_state: ProvisionState,

    /// Maintenance flag; vetoes all automated remediation
    #[serde(default)]
    pub maintenance: bool,

    /// Driver identifier
    pub driver: String,

    /// Driver parameters, including hardware references
    #[serde(default)]
    pub driver_info: Map<String, Value>,

    /// Hardware properties and the capability string
    #[serde(default)]
    pub properties: Map<String, Value>,

    /// Last error reported by the registry
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Node {
    /// Create a node with empty parameter bags
    pub fn new(id: impl Into<NodeId>, driver: impl Into<String>, state: ProvisionState) -> Self {
        Self {
            id: id.into(),
            name: None,
            provision_state: state,
            maintenance: false,
            driver: driver.into(),
            driver_info: Map::new(),
            properties: Map::new(),
            last_error: None,
        }
    }

    /// Parse the capability string stored in `properties`.
    ///
    /// An absent or null value yields no capabilities; a value that is not a
    /// string is rejected.
    pub fn capabilities(&self) -> ParameterResult<Capabilities> {
        match self.properties.get(CAPABILITIES_KEY) {
            None | Some(Value::Null) => Ok(Capabilities::default()),
            Some(Value::String(raw)) => parse_capabilities(raw),
            Some(other) => Err(ParameterError::InvalidParameterValue(format!(
                "Value of 'capabilities' must be string. Got {}",
                other
            ))),
        }
    }

    /// Non-empty string value from `driver_info`
    pub fn driver_info_str(&self, key: &str) -> Option<&str> {
        self.driver_info
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Look a reference up in the capabilities first, then in `driver_info`
    pub fn resolve_reference(&self, key: &str) -> ParameterResult<Option<String>> {
        let capabilities = self.capabilities()?;
        if let Some(value) = capabilities.get(key).filter(|v| !v.is_empty()) {
            return Ok(Some(value.to_string()));
        }
        Ok(self.driver_info_str(key).map(str::to_string))
    }

    /// Whether the node asks for dynamic allocation
    pub fn dynamic_allocation(&self) -> ParameterResult<bool> {
        parse_dynamic_allocation(self.driver_info.get(DYNAMIC_ALLOCATION_KEY))
    }

    /// Required hardware properties that are absent, null or empty
    pub fn missing_properties<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|key| match self.properties.get(key.as_str()) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            })
            .map(String::as_str)
            .collect()
    }
}

/// Parsed `key:value` capability pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(BTreeMap<String, String>);

impl Capabilities {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
        write!(f, "{}", pairs.join(","))
    }
}

/// Parse a capability string such as `"a:/rest/x,b:/rest/y"`.
///
/// Every comma-separated entry must contain exactly one `:`.
pub fn parse_capabilities(raw: &str) -> ParameterResult<Capabilities> {
    let mut map = BTreeMap::new();
    if raw.is_empty() {
        return Ok(Capabilities(map));
    }

    for entry in raw.split(',') {
        let mut parts = entry.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => {
                map.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(ParameterError::InvalidParameterValue(format!(
                    "Malformed capabilities value: {}",
                    entry
                )))
            }
        }
    }

    Ok(Capabilities(map))
}

/// Interpret the `dynamic_allocation` flag of a node's `driver_info`
pub fn parse_dynamic_allocation(value: Option<&Value>) -> ParameterResult<bool> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::String(s)) if s == "true" || s == "True" => Ok(true),
        Some(Value::String(s)) if s == "false" || s == "False" => Ok(false),
        Some(other) => Err(ParameterError::InvalidParameterValue(format!(
            "Invalid dynamic_allocation value {}. Valid values are booleans true or false",
            other
        ))),
    }
}

/// Provision state reported by the Node Registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProvisionState {
    Enroll,
    Manageable,
    Inspecting,
    InspectFailed,
    Available,
    Active,
    /// Any state hwsync does not act on
    Other(String),
}

impl ProvisionState {
    pub fn as_str(&self) -> &str {
        match self {
            ProvisionState::Enroll => "enroll",
            ProvisionState::Manageable => "manageable",
            ProvisionState::Inspecting => "inspecting",
            ProvisionState::InspectFailed => "inspect failed",
            ProvisionState::Available => "available",
            ProvisionState::Active => "active",
            ProvisionState::Other(s) => s,
        }
    }
}

impl From<String> for ProvisionState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "enroll" => ProvisionState::Enroll,
            "manageable" => ProvisionState::Manageable,
            "inspecting" => ProvisionState::Inspecting,
            "inspect failed" => ProvisionState::InspectFailed,
            "available" => ProvisionState::Available,
            "active" => ProvisionState::Active,
            _ => ProvisionState::Other(value),
        }
    }
}

impl From<&str> for ProvisionState {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ProvisionState> for String {
    fn from(value: ProvisionState) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provision state verbs accepted by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionTarget {
    Manage,
    Provide,
    Inspect,
}

impl ProvisionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionTarget::Manage => "manage",
            ProvisionTarget::Provide => "provide",
            ProvisionTarget::Inspect => "inspect",
        }
    }

    /// State a node lands in once the verb has been applied
    pub fn resulting_state(&self) -> ProvisionState {
        match self {
            ProvisionTarget::Manage => ProvisionState::Manageable,
            ProvisionTarget::Provide => ProvisionState::Available,
            ProvisionTarget::Inspect => ProvisionState::Inspecting,
        }
    }
}

impl fmt::Display for ProvisionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
