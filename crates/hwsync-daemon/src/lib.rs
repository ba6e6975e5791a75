//! hwsync Daemon library
//!
//! Components of `hwsyncd`:
//! - configuration loading and validation
//! - the scheduler that runs reconciliation passes on a worker pool
//! - the inventory auditor
//! - server wiring and shutdown handling

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod inventory;
pub mod scheduler;
pub mod server;

pub use config::DaemonConfig;
pub use error::{DaemonError, DaemonResult};
pub use inventory::{InventoryAuditor, UnclaimedHardware};
pub use scheduler::{NodeReport, NodeResult, Scheduler};
pub use server::Server;
