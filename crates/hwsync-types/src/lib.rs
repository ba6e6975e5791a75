//! hwsync Types - Core types for bare-metal node reconciliation
//!
//! hwsync keeps the provisioning state of bare-metal nodes in a Node Registry
//! in step with the physical-hardware state held by a Hardware Manager.
//!
//! ## Architectural Boundaries
//!
//! - **Node Registry** owns: nodes, ports, provision states
//! - **Hardware Manager** owns: hardware records, profiles, templates, tasks
//! - **hwsync** owns: nothing persistent; it reads both sides and issues
//!   remediation calls
//!
//! ## Key Concepts
//!
//! - **Node**: A bare-metal inventory record progressing through provision states
//! - **HardwareRecord**: The Hardware Manager's view of a physical machine
//! - **Profile**: A configuration document bindable to exactly one HardwareRecord
//! - **Port**: A network presence (MAC address) registered for a node
//! - **AsyncTask**: A long-running Hardware Manager operation, polled to completion

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod hardware;
pub mod ids;
pub mod node;
pub mod port;

// Re-export main types
pub use error::{ParameterError, ParameterResult};
pub use hardware::{
    AssignmentState, AssociatedResource, AsyncTask, BootSettings, Connection, DeviceSlot,
    HardwareRecord, PhysicalPort, PortMap, Profile, TaskError, TaskOutcome,
};
pub use ids::{NodeId, PortId};
pub use node::{
    parse_capabilities, parse_dynamic_allocation, Capabilities, Node, ProvisionState,
    ProvisionTarget,
};
pub use port::Port;
