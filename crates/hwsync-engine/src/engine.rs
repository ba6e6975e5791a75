//! Reconciliation engine

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::transitions::{remediation_for, Remediation};
use hwsync_client::{HardwareError, HardwareOps};
use hwsync_registry::NodeRegistry;
use hwsync_types::{Node, ParameterError, ProvisionTarget};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Reference to the hardware record a node runs on
pub const SERVER_HARDWARE_URI_KEY: &str = "server_hardware_uri";

/// Reference to the template profiles are created from
pub const SERVER_PROFILE_TEMPLATE_URI_KEY: &str = "server_profile_template_uri";

/// What [`ReconciliationEngine::process`] did with a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Node is in maintenance
    Skipped,
    /// Provision state is not one hwsync acts on
    Ignored,
    /// A provision state transition was requested
    Advanced { target: ProvisionTarget },
    /// Nothing to do yet
    Unchanged,
}

impl fmt::Display for NodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeOutcome::Skipped => write!(f, "skipped"),
            NodeOutcome::Ignored => write!(f, "ignored"),
            NodeOutcome::Advanced { target } => write!(f, "advanced to {}", target),
            NodeOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Per-node state machine
pub struct ReconciliationEngine {
    hardware: Arc<dyn HardwareOps>,
    registry: Arc<dyn NodeRegistry>,
    config: EngineConfig,
}

impl ReconciliationEngine {
    pub fn new(
        hardware: Arc<dyn HardwareOps>,
        registry: Arc<dyn NodeRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            hardware,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a pass should hand `node` to [`process`](Self::process)
    pub fn is_actionable(&self, node: &Node) -> bool {
        self.config.manages(node) && remediation_for(&node.provision_state).is_some()
    }

    /// Reconcile one node.
    ///
    /// Maintenance is checked before anything else; a node in maintenance is
    /// never touched.
    #[instrument(skip_all, fields(node_id = %node.id, provision_state = %node.provision_state))]
    pub async fn process(&self, node: &Node) -> EngineResult<NodeOutcome> {
        if node.maintenance {
            debug!("Node in maintenance, skipping");
            return Ok(NodeOutcome::Skipped);
        }

        match remediation_for(&node.provision_state) {
            None => Ok(NodeOutcome::Ignored),
            Some(Remediation::EnrollRemediation) => self.remediate_enroll(node).await,
            Some(Remediation::ManageableAdvance) => self.advance_manageable(node).await,
            Some(Remediation::InspectFailedRecovery) => self.recover_inspect_failed(node).await,
        }
    }

    async fn remediate_enroll(&self, node: &Node) -> EngineResult<NodeOutcome> {
        let hardware_uri = node
            .resolve_reference(SERVER_HARDWARE_URI_KEY)?
            .ok_or_else(|| {
                ParameterError::MissingParameterValue(format!(
                    "Missing '{}' for node {}",
                    SERVER_HARDWARE_URI_KEY, node.id
                ))
            })?;
        let template_uri = node.resolve_reference(SERVER_PROFILE_TEMPLATE_URI_KEY)?;
        let dynamic = node.dynamic_allocation()?;

        let profile_uri = if dynamic {
            debug!(hardware_uri = %hardware_uri, "Dynamic allocation, leaving profile alone");
            None
        } else {
            Some(
                self.ensure_profile(node, &hardware_uri, template_uri.as_deref())
                    .await?,
            )
        };

        self.ensure_port(node, &hardware_uri, profile_uri.as_deref())
            .await?;
        self.advance(node, ProvisionTarget::Manage).await
    }

    /// URI of the profile bound to the node's hardware, creating it when absent
    async fn ensure_profile(
        &self,
        node: &Node,
        hardware_uri: &str,
        template_uri: Option<&str>,
    ) -> EngineResult<String> {
        let hardware = self.hardware.get_hardware_record(hardware_uri).await?;
        if let Some(existing) = hardware.profile_uri() {
            warn!(
                node_id = %node.id,
                hardware_uri,
                profile_uri = existing,
                "Server hardware already has a Server Profile assigned"
            );
            return Ok(existing.to_string());
        }

        let name = self.config.profile_name(&node.id);
        let err = match self
            .hardware
            .assign_profile_from_template(template_uri.unwrap_or_default(), &name, hardware_uri)
            .await
        {
            Ok(profile_uri) => {
                info!(node_id = %node.id, hardware_uri, profile_uri = %profile_uri, "Server Profile assigned");
                return Ok(profile_uri);
            }
            Err(err) => err,
        };

        warn!(node_id = %node.id, hardware_uri, error = %err, "Profile assignment failed, re-reading hardware");
        match self.hardware.get_hardware_record(hardware_uri).await {
            Ok(hardware) => match hardware.profile_uri() {
                Some(profile_uri) => {
                    info!(node_id = %node.id, profile_uri, "Profile present despite failed assignment");
                    Ok(profile_uri.to_string())
                }
                None => Err(err.into()),
            },
            Err(_) => Err(err.into()),
        }
    }

    /// Make sure the node's boot MAC is registered as a port
    async fn ensure_port(
        &self,
        node: &Node,
        hardware_uri: &str,
        profile_uri: Option<&str>,
    ) -> EngineResult<()> {
        let mac = self.resolve_boot_mac(node, hardware_uri, profile_uri).await?;

        let ports = self.registry.list_ports_by_mac(&mac).await?;
        if let Some(foreign) = ports.iter().find(|p| p.node_id != node.id) {
            return Err(EngineError::PortConflict {
                mac,
                node_id: node.id.clone(),
                owner: foreign.node_id.clone(),
            });
        }
        if !ports.is_empty() {
            warn!(node_id = %node.id, mac = %mac, "Port already registered");
            return Ok(());
        }

        let port = self.registry.create_port(&node.id, &mac, None).await?;
        info!(node_id = %node.id, mac = %mac, port_id = %port.id, "Port created");
        Ok(())
    }

    async fn resolve_boot_mac(
        &self,
        node: &Node,
        hardware_uri: &str,
        profile_uri: Option<&str>,
    ) -> EngineResult<String> {
        let no_boot = || EngineError::NoBootableConnectionFound(node.id.clone());

        if let Some(profile_uri) = profile_uri {
            let profile = self.hardware.get_profile(profile_uri).await?;
            if !profile.connections.is_empty() {
                return profile
                    .primary_boot_connection()
                    .and_then(|c| c.mac.as_deref())
                    .filter(|mac| !mac.is_empty())
                    .map(str::to_string)
                    .ok_or_else(no_boot);
            }
        }

        let hardware = self.hardware.get_hardware_record(hardware_uri).await?;
        match self.hardware.derive_mac(&hardware).await {
            Ok(mac) if !mac.is_empty() => Ok(mac),
            Ok(_) | Err(HardwareError::ResourceNotFound(_)) => Err(no_boot()),
            Err(err) => Err(err.into()),
        }
    }

    async fn advance_manageable(&self, node: &Node) -> EngineResult<NodeOutcome> {
        let missing = node.missing_properties(&self.config.required_properties);
        let target = if self.config.inspection_enabled && !missing.is_empty() {
            info!(node_id = %node.id, missing = ?missing, "Hardware properties missing, inspecting");
            ProvisionTarget::Inspect
        } else {
            ProvisionTarget::Provide
        };
        self.advance(node, target).await
    }

    async fn recover_inspect_failed(&self, node: &Node) -> EngineResult<NodeOutcome> {
        match node.last_error.as_deref() {
            Some(last_error) if last_error.contains(&self.config.claimed_marker) => {
                warn!(node_id = %node.id, "Inspection failed on claimed hardware, managing again");
                self.advance(node, ProvisionTarget::Manage).await
            }
            last_error => {
                warn!(node_id = %node.id, last_error = ?last_error, "Inspection failed, leaving node for an operator");
                Ok(NodeOutcome::Unchanged)
            }
        }
    }

    async fn advance(&self, node: &Node, target: ProvisionTarget) -> EngineResult<NodeOutcome> {
        self.registry
            .set_provision_state(&node.id, target)
            .await
            .map_err(|source| EngineError::StateTransition {
                node_id: node.id.clone(),
                target,
                source,
            })?;
        info!(node_id = %node.id, target = %target, "Provision state transition requested");
        Ok(NodeOutcome::Advanced { target })
    }
}
