//! Daemon wiring and lifecycle

use crate::config::DaemonConfig;
use crate::error::DaemonResult;
use crate::inventory::InventoryAuditor;
use crate::scheduler::{NodeReport, Scheduler};
use hwsync_client::{HardwareClient, HardwareGateway, HardwareOps};
use hwsync_engine::ReconciliationEngine;
use hwsync_registry::{HttpRegistry, InMemoryRegistry, NodeRegistry};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// hwsync daemon
pub struct Server {
    scheduler: Arc<Scheduler>,
    auditor: Option<Arc<InventoryAuditor>>,
    /// Set in dry-run mode; holds every registry write made during the run
    dry_run: Option<InMemoryRegistry>,
}

impl Server {
    /// Connect to the Hardware Manager and the Node Registry.
    ///
    /// With `dry_run`, nodes are copied from the live registry into an
    /// in-memory one once and all registry writes stay in the process.
    pub async fn new(config: DaemonConfig, dry_run: bool) -> DaemonResult<Self> {
        config.validate()?;

        let client = Arc::new(HardwareClient::new(config.hardware_manager.client_config())?);
        let hardware: Arc<dyn HardwareOps> = Arc::new(HardwareGateway::new(client)?);

        let live = HttpRegistry::new(config.registry.http_config())?;
        if !dry_run {
            return Ok(Self::with_components(config, hardware, Arc::new(live)));
        }

        let snapshot = InMemoryRegistry::new();
        for node in live.list_nodes().await? {
            snapshot.upsert_node(node).await;
        }
        info!("Dry run: registry writes are kept in memory");

        let mut server = Self::with_components(config, hardware, Arc::new(snapshot.clone()));
        server.dry_run = Some(snapshot);
        Ok(server)
    }

    /// Assemble a server around already-built backends
    pub fn with_components(
        config: DaemonConfig,
        hardware: Arc<dyn HardwareOps>,
        registry: Arc<dyn NodeRegistry>,
    ) -> Self {
        let engine = Arc::new(ReconciliationEngine::new(
            hardware.clone(),
            registry.clone(),
            config.engine.clone(),
        ));
        let scheduler = Scheduler::new(config.scheduler.clone(), engine, registry.clone());
        let auditor = config.inventory.enabled.then(|| {
            InventoryAuditor::new(
                hardware,
                registry,
                config.engine.clone(),
                config.inventory.clone(),
            )
        });

        Self {
            scheduler,
            auditor,
            dry_run: None,
        }
    }

    /// Run a single reconciliation pass
    pub async fn run_once(&self) -> DaemonResult<Vec<NodeReport>> {
        let reports = self.scheduler.run_once().await?;
        self.report_dry_run().await;
        Ok(reports)
    }

    /// Run until SIGINT or SIGTERM
    pub async fn run(self) -> DaemonResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` resolves, then stop both loops
    pub async fn run_until(self, signal: impl std::future::Future<Output = ()>) -> DaemonResult<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scheduler = tokio::spawn(self.scheduler.clone().run(shutdown_rx.clone()));
        let auditor = self
            .auditor
            .clone()
            .map(|auditor| tokio::spawn(auditor.run(shutdown_rx.clone())));

        info!("hwsync daemon running");
        signal.await;
        info!("hwsync daemon shutting down");

        let _ = shutdown_tx.send(true);
        if let Err(e) = scheduler.await {
            error!(error = %e, "Scheduler task failed");
        }
        if let Some(auditor) = auditor {
            if let Err(e) = auditor.await {
                error!(error = %e, "Inventory auditor task failed");
            }
        }

        self.report_dry_run().await;
        Ok(())
    }

    async fn report_dry_run(&self) {
        let Some(registry) = &self.dry_run else {
            return;
        };
        for transition in registry.transitions().await {
            info!(node_id = %transition.node_id, target = %transition.target, "Dry run: would request transition");
        }
        for port in registry.ports().await {
            info!(node_id = %port.node_id, mac = %port.address, "Dry run: would create port");
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
