//! Scheduling of reconciliation passes

mod reconciler;

pub use reconciler::{NodeReport, NodeResult, Scheduler};
