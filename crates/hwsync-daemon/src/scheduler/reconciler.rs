//! Reconciliation loop and worker pool

use crate::config::SchedulerConfig;
use crate::error::DaemonResult;
use futures::FutureExt;
use hwsync_engine::{ErrorKind, NodeOutcome, ReconciliationEngine};
use hwsync_registry::NodeRegistry;
use hwsync_types::{Node, NodeId};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How processing a single node ended
#[derive(Debug, Clone, PartialEq)]
pub enum NodeResult {
    Completed(NodeOutcome),
    Failed { kind: ErrorKind, message: String },
    Panicked(String),
}

/// Result of one node within a pass
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReport {
    pub node_id: NodeId,
    pub result: NodeResult,
}

impl NodeReport {
    pub fn is_failure(&self) -> bool {
        !matches!(self.result, NodeResult::Completed(_))
    }

    fn log(&self) {
        match &self.result {
            NodeResult::Completed(NodeOutcome::Advanced { target }) => {
                info!(node_id = %self.node_id, target = %target, "Node advanced")
            }
            NodeResult::Completed(outcome) => {
                debug!(node_id = %self.node_id, outcome = %outcome, "Node processed")
            }
            NodeResult::Failed { kind, message } => {
                error!(node_id = %self.node_id, error_kind = %kind, error = %message, "Node reconciliation failed")
            }
            NodeResult::Panicked(message) => {
                error!(node_id = %self.node_id, panic = %message, "Node reconciliation panicked")
            }
        }
    }
}

/// Runs reconciliation passes over every actionable node
pub struct Scheduler {
    config: SchedulerConfig,
    engine: Arc<ReconciliationEngine>,
    registry: Arc<dyn NodeRegistry>,
    workers: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        engine: Arc<ReconciliationEngine>,
        registry: Arc<dyn NodeRegistry>,
    ) -> Arc<Self> {
        let workers = Arc::new(Semaphore::new(config.max_workers.max(1)));
        Arc::new(Self {
            config,
            engine,
            registry,
            workers,
        })
    }

    /// Run passes until `shutdown` flips to true.
    ///
    /// A pass in flight when shutdown arrives gets the configured grace
    /// period; after that its remaining node tasks are aborted.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            max_workers = self.config.max_workers,
            "Scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pass = self.run_once();
            tokio::pin!(pass);

            let delay = tokio::select! {
                result = &mut pass => self.next_delay(result),
                _ = shutdown.changed() => {
                    let grace = self.config.shutdown_grace();
                    info!(grace_secs = grace.as_secs(), "Shutdown requested, waiting for in-flight pass");
                    if tokio::time::timeout(grace, &mut pass).await.is_err() {
                        warn!("Grace period elapsed, abandoning in-flight pass");
                    }
                    break;
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Scheduler stopped");
    }

    fn next_delay(&self, result: DaemonResult<Vec<NodeReport>>) -> Duration {
        match result {
            Ok(_) => self.config.poll_interval(),
            Err(e) => {
                error!(
                    error = %e,
                    retry_in_secs = self.config.retry_interval_secs,
                    "Reconciliation pass failed"
                );
                self.config.retry_interval()
            }
        }
    }

    /// One pass: list nodes, process every actionable one on the worker
    /// pool, and wait for all of them.
    pub async fn run_once(&self) -> DaemonResult<Vec<NodeReport>> {
        let nodes = self.registry.list_nodes().await?;
        let total = nodes.len();
        let actionable: Vec<Node> = nodes
            .into_iter()
            .filter(|node| self.engine.is_actionable(node))
            .collect();

        info!(
            total,
            actionable = actionable.len(),
            "Starting reconciliation pass"
        );

        let mut tasks = JoinSet::new();
        for node in actionable {
            // Blocks once every worker is busy
            let permit = match self.workers.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let engine = self.engine.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = AssertUnwindSafe(engine.process(&node))
                    .catch_unwind()
                    .await;
                let result = match result {
                    Ok(Ok(outcome)) => NodeResult::Completed(outcome),
                    Ok(Err(e)) => NodeResult::Failed {
                        kind: e.kind(),
                        message: e.to_string(),
                    },
                    Err(panic) => NodeResult::Panicked(panic_message(panic.as_ref())),
                };
                NodeReport {
                    node_id: node.id,
                    result,
                }
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    report.log();
                    reports.push(report);
                }
                Err(e) => error!(error = %e, "Node task did not complete"),
            }
        }

        let failed = reports.iter().filter(|r| r.is_failure()).count();
        info!(
            processed = reports.len(),
            failed, "Reconciliation pass finished"
        );
        Ok(reports)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
