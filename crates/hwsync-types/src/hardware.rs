//! Hardware Manager resources
//!
//! Only the fields hwsync reads are modelled; everything else in the
//! Hardware Manager's documents is ignored on deserialization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Profile assignment state of a hardware record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssignmentState {
    NoProfileApplied,
    ApplyingProfile,
    ProfileApplied,
    Unknown(String),
}

impl From<String> for AssignmentState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "NoProfileApplied" => AssignmentState::NoProfileApplied,
            "ApplyingProfile" => AssignmentState::ApplyingProfile,
            "ProfileApplied" => AssignmentState::ProfileApplied,
            _ => AssignmentState::Unknown(value),
        }
    }
}

impl From<AssignmentState> for String {
    fn from(value: AssignmentState) -> Self {
        value.to_string()
    }
}

impl Default for AssignmentState {
    fn default() -> Self {
        AssignmentState::Unknown(String::new())
    }
}

impl fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentState::NoProfileApplied => write!(f, "NoProfileApplied"),
            AssignmentState::ApplyingProfile => write!(f, "ApplyingProfile"),
            AssignmentState::ProfileApplied => write!(f, "ProfileApplied"),
            AssignmentState::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// A physical machine as seen by the Hardware Manager
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HardwareRecord {
    pub uri: String,
    pub name: String,
    pub state: AssignmentState,
    pub server_profile_uri: Option<String>,
    pub port_map: Option<PortMap>,
    pub server_hardware_type_uri: Option<String>,
    pub server_group_uri: Option<String>,
}

impl HardwareRecord {
    /// Profile currently bound to this hardware, if any
    pub fn profile_uri(&self) -> Option<&str> {
        self.server_profile_uri.as_deref().filter(|u| !u.is_empty())
    }

    /// MAC of the first physical port of the first device slot
    pub fn first_port_mac(&self) -> Option<&str> {
        self.port_map
            .as_ref()?
            .device_slots
            .first()?
            .physical_ports
            .first()?
            .mac
            .as_deref()
            .filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortMap {
    pub device_slots: Vec<DeviceSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceSlot {
    pub physical_ports: Vec<PhysicalPort>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalPort {
    pub mac: Option<String>,
}

/// A server profile bound (or bindable) to one hardware record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub uri: String,
    pub name: String,
    pub server_hardware_uri: Option<String>,
    pub connections: Vec<Connection>,
}

impl Profile {
    /// First connection whose boot priority is primary (case-insensitive)
    pub fn primary_boot_connection(&self) -> Option<&Connection> {
        self.connections.iter().find(|c| c.is_primary_boot())
    }
}

/// A network connection defined on a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Connection {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub mac: Option<String>,
    pub boot: Option<BootSettings>,
}

impl Connection {
    pub fn is_primary_boot(&self) -> bool {
        self.boot
            .as_ref()
            .and_then(|b| b.priority.as_deref())
            .map(|p| p.eq_ignore_ascii_case("primary"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootSettings {
    pub priority: Option<String>,
}

/// A long-running Hardware Manager operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AsyncTask {
    pub uri: String,
    pub task_state: Option<String>,
    pub task_status: Option<String>,
    pub associated_resource: Option<AssociatedResource>,
    pub task_errors: Vec<TaskError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssociatedResource {
    pub resource_uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskError {
    pub message: Option<String>,
}

/// Classification of a task snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Associated resource is known
    Completed(String),
    /// Task reported errors
    Failed(Vec<String>),
    /// Neither yet
    Pending,
}

impl AsyncTask {
    /// URI of the resource the task produced, once set
    pub fn resource_uri(&self) -> Option<&str> {
        self.associated_resource
            .as_ref()?
            .resource_uri
            .as_deref()
            .filter(|u| !u.is_empty())
    }

    pub fn outcome(&self) -> TaskOutcome {
        if !self.task_errors.is_empty() {
            return TaskOutcome::Failed(
                self.task_errors
                    .iter()
                    .map(|e| e.message.clone().unwrap_or_default())
                    .collect(),
            );
        }
        match self.resource_uri() {
            Some(uri) if self.is_completed() => TaskOutcome::Completed(uri.to_string()),
            _ => TaskOutcome::Pending,
        }
    }

    /// Whether polling can stop: a resource is associated or errors were reported
    pub fn is_settled(&self) -> bool {
        self.resource_uri().is_some() || !self.task_errors.is_empty()
    }

    fn is_completed(&self) -> bool {
        match self.task_state.as_deref() {
            Some(state) => state == "Completed",
            None => true,
        }
    }
}
