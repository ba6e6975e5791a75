//! hwsync Engine - Per-node reconciliation
//!
//! [`ReconciliationEngine::process`] looks at one node, picks the remediation
//! for its provision state from a fixed transition table, and drives the
//! Hardware Manager and the Node Registry until the node can advance.
//!
//! The engine never loops or sleeps on its own; the daemon's scheduler
//! decides when a node is looked at again.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod engine;
pub mod error;
pub mod transitions;

pub use config::EngineConfig;
pub use engine::{
    NodeOutcome, ReconciliationEngine, SERVER_HARDWARE_URI_KEY, SERVER_PROFILE_TEMPLATE_URI_KEY,
};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use transitions::{remediation_for, Remediation, TRANSITIONS};
