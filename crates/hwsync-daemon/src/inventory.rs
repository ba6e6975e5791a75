//! Audit of hardware that matches a profile template but has no node
//!
//! Runs on its own interval next to the scheduler and only logs; it never
//! enrolls anything.

use crate::config::InventoryConfig;
use crate::error::DaemonResult;
use hwsync_client::{HardwareError, HardwareOps, HardwareResult};
use hwsync_engine::{EngineConfig, SERVER_HARDWARE_URI_KEY};
use hwsync_registry::NodeRegistry;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Hardware that no managed node refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnclaimedHardware {
    pub template_uri: String,
    pub hardware_uri: String,
    pub name: String,
}

pub struct InventoryAuditor {
    hardware: Arc<dyn HardwareOps>,
    registry: Arc<dyn NodeRegistry>,
    engine: EngineConfig,
    config: InventoryConfig,
}

impl InventoryAuditor {
    pub fn new(
        hardware: Arc<dyn HardwareOps>,
        registry: Arc<dyn NodeRegistry>,
        engine: EngineConfig,
        config: InventoryConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            hardware,
            registry,
            engine,
            config,
        })
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.check_interval_secs);
        info!(
            check_interval_secs = self.config.check_interval_secs,
            templates = self.config.profile_templates.len(),
            "Inventory auditor started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.check_once().await {
                warn!(error = %e, "Inventory check failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Inventory auditor stopped");
    }

    /// Check every configured template once
    pub async fn check_once(&self) -> DaemonResult<Vec<UnclaimedHardware>> {
        if self.config.profile_templates.is_empty() {
            info!("No profile templates configured, skipping inventory check");
            return Ok(Vec::new());
        }

        let claimed = self.claimed_hardware().await?;
        let mut unclaimed = Vec::new();
        for template_uri in &self.config.profile_templates {
            match self.check_template(template_uri, &claimed).await {
                Ok(found) => unclaimed.extend(found),
                Err(e) => warn!(template_uri = %template_uri, error = %e, "Could not check template"),
            }
        }
        Ok(unclaimed)
    }

    /// Hardware URIs referenced by managed nodes
    async fn claimed_hardware(&self) -> DaemonResult<HashSet<String>> {
        let nodes = self.registry.list_nodes().await?;
        let mut claimed = HashSet::new();
        for node in nodes.iter().filter(|n| self.engine.manages(n)) {
            match node.resolve_reference(SERVER_HARDWARE_URI_KEY) {
                Ok(Some(uri)) => {
                    claimed.insert(uri);
                }
                Ok(None) => {}
                Err(e) => debug!(node_id = %node.id, error = %e, "Ignoring node with bad parameters"),
            }
        }
        Ok(claimed)
    }

    async fn check_template(
        &self,
        template_uri: &str,
        claimed: &HashSet<String>,
    ) -> HardwareResult<Vec<UnclaimedHardware>> {
        let template = self.hardware.get_profile_template(template_uri).await?;
        let type_uri = template
            .get("serverHardwareTypeUri")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                HardwareError::Decode(format!(
                    "template {} has no serverHardwareTypeUri",
                    template_uri
                ))
            })?;
        let group_uri = template.get("enclosureGroupUri").and_then(Value::as_str);

        let available = self
            .hardware
            .list_available_hardware(type_uri, group_uri)
            .await?;

        let unclaimed: Vec<UnclaimedHardware> = available
            .into_iter()
            .filter(|hw| !claimed.contains(&hw.uri))
            .map(|hw| UnclaimedHardware {
                template_uri: template_uri.to_string(),
                hardware_uri: hw.uri,
                name: hw.name,
            })
            .collect();

        for hw in &unclaimed {
            info!(
                template_uri,
                hardware_uri = %hw.hardware_uri,
                name = %hw.name,
                "Hardware matches template but is not enrolled"
            );
        }
        Ok(unclaimed)
    }
}
