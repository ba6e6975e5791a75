//! Typed hardware operations on top of [`HardwareClient`]
//!
//! The reconciliation engine only sees the [`HardwareOps`] trait, which
//! [`HardwareGateway`] implements against a live Hardware Manager.

use crate::client::HardwareClient;
use crate::clone::{build_clone_body, volume_uris};
use crate::console::{ConsoleEndpoint, ConsoleMacSource, IloConsole};
use crate::error::{HardwareError, HardwareResult};
use async_trait::async_trait;
use hwsync_types::{AssignmentState, AsyncTask, HardwareRecord, Profile, TaskOutcome};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Collection endpoint for server profiles
pub const SERVER_PROFILES_URI: &str = "/rest/server-profiles";

/// Collection endpoint for hardware records
pub const SERVER_HARDWARE_URI: &str = "/rest/server-hardware";

/// Hardware-domain operations used by the reconciliation engine and the
/// inventory auditor
#[async_trait]
pub trait HardwareOps: Send + Sync {
    async fn get_hardware_record(&self, uri: &str) -> HardwareResult<HardwareRecord>;

    async fn get_profile(&self, uri: &str) -> HardwareResult<Profile>;

    /// Raw profile template document
    async fn get_profile_template(&self, uri: &str) -> HardwareResult<Value>;

    /// Create a profile from `template_uri` bound to `hardware_uri`; returns
    /// the new profile's URI.
    ///
    /// `name` is used as given; nodes get `EngineConfig::profile_name`,
    /// i.e. `"Ironic [<node id>]"` by default.
    async fn assign_profile_from_template(
        &self,
        template_uri: &str,
        name: &str,
        hardware_uri: &str,
    ) -> HardwareResult<String>;

    /// Clone the template into a new profile for `hardware_uri`, provisioning
    /// fresh SAN volumes; returns the applied profile's URI.
    ///
    /// As with [`assign_profile_from_template`](Self::assign_profile_from_template),
    /// `name` must already be the node's profile name.
    async fn clone_and_assign_profile(
        &self,
        hardware_uri: &str,
        template_uri: &str,
        name: &str,
    ) -> HardwareResult<String>;

    async fn unassign_profile(&self, hardware_uri: &str, profile_uri: &str) -> HardwareResult<()>;

    /// MAC of the hardware's primary physical NIC
    async fn derive_mac(&self, hardware: &HardwareRecord) -> HardwareResult<String>;

    /// Hardware of the given type (and group) with no profile applied,
    /// sorted by name
    async fn list_available_hardware(
        &self,
        type_uri: &str,
        group_uri: Option<&str>,
    ) -> HardwareResult<Vec<HardwareRecord>>;
}

/// [`HardwareOps`] against a live Hardware Manager
pub struct HardwareGateway {
    client: Arc<HardwareClient>,
    console: Arc<dyn ConsoleMacSource>,
}

impl HardwareGateway {
    /// Gateway using the iLO console lookup for MAC fallback
    pub fn new(client: Arc<HardwareClient>) -> HardwareResult<Self> {
        let console = IloConsole::new(client.config().allow_insecure_connections)?;
        Ok(Self::with_console(client, Arc::new(console)))
    }

    pub fn with_console(client: Arc<HardwareClient>, console: Arc<dyn ConsoleMacSource>) -> Self {
        Self { client, console }
    }

    /// GET `uri` and reject documents without a `uri` field
    async fn get_resource(&self, uri: &str) -> HardwareResult<Value> {
        let value = self.client.get(uri).await?;
        let has_uri = value
            .get("uri")
            .and_then(Value::as_str)
            .map_or(false, |u| !u.is_empty());
        if !has_uri {
            return Err(HardwareError::ResourceNotFound(uri.to_string()));
        }
        Ok(value)
    }

    /// Poll the task created for a new profile until it completes
    async fn wait_for_assignment(&self, task_uri: &str) -> HardwareResult<String> {
        let config = self.client.config();

        for round in 0..=config.max_retries {
            let task = self
                .client
                .wait_for_task(task_uri, config.task_max_wait)
                .await?;
            match task.outcome() {
                TaskOutcome::Completed(profile_uri) => return Ok(profile_uri),
                TaskOutcome::Failed(errors) => {
                    return Err(HardwareError::TaskFailed {
                        task_uri: task_uri.to_string(),
                        errors,
                    })
                }
                TaskOutcome::Pending => {
                    debug!(task_uri, round, state = ?task.task_state, "Profile task still running");
                    tokio::time::sleep(config.assignment_poll_interval).await;
                }
            }
        }

        Err(HardwareError::MaxRetriesExceeded {
            uri: task_uri.to_string(),
            attempts: config.max_retries.saturating_add(1),
        })
    }

    /// Poll a hardware record until it reaches `target`
    async fn wait_for_hardware_state(
        &self,
        hardware_uri: &str,
        target: AssignmentState,
    ) -> HardwareResult<HardwareRecord> {
        let config = self.client.config();

        for _ in 0..config.max_retries {
            tokio::time::sleep(config.assignment_poll_interval).await;
            let hardware = self.get_hardware_record(hardware_uri).await?;
            if hardware.state == target {
                return Ok(hardware);
            }
            debug!(hardware_uri, state = %hardware.state, target = %target, "Waiting for hardware state");
        }

        Err(HardwareError::MaxRetriesExceeded {
            uri: hardware_uri.to_string(),
            attempts: config.max_retries,
        })
    }

    async fn console_mac(&self, hardware: &HardwareRecord) -> HardwareResult<Option<String>> {
        let console = self
            .client
            .get(&format!("{}/remoteConsoleUrl", hardware.uri))
            .await?;

        let endpoint = match console
            .get("remoteConsoleUrl")
            .and_then(Value::as_str)
            .and_then(ConsoleEndpoint::parse)
        {
            Some(endpoint) => endpoint,
            None => return Ok(None),
        };

        match self.console.host_mac(&endpoint).await {
            Ok(mac) => Ok(mac),
            Err(e) => {
                warn!(hardware_uri = %hardware.uri, error = %e, "Console MAC lookup failed");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl HardwareOps for HardwareGateway {
    #[instrument(skip(self))]
    async fn get_hardware_record(&self, uri: &str) -> HardwareResult<HardwareRecord> {
        decode(self.get_resource(uri).await?, uri)
    }

    #[instrument(skip(self))]
    async fn get_profile(&self, uri: &str) -> HardwareResult<Profile> {
        decode(self.get_resource(uri).await?, uri)
    }

    async fn get_profile_template(&self, uri: &str) -> HardwareResult<Value> {
        if uri.is_empty() {
            return Err(HardwareError::TemplateNotFound(
                "no profile template reference".to_string(),
            ));
        }
        self.get_resource(uri).await
    }

    #[instrument(skip(self))]
    async fn assign_profile_from_template(
        &self,
        template_uri: &str,
        name: &str,
        hardware_uri: &str,
    ) -> HardwareResult<String> {
        if template_uri.is_empty() {
            return Err(HardwareError::TemplateNotFound(
                "no profile template reference".to_string(),
            ));
        }

        let mut profile = self
            .client
            .get(&format!("{}/new-profile", template_uri))
            .await?;
        let fields = profile.as_object_mut().ok_or_else(|| {
            HardwareError::TemplateNotFound(format!("{} produced no profile", template_uri))
        })?;
        fields.insert("name".into(), json!(name));
        fields.insert("serverHardwareUri".into(), json!(hardware_uri));

        let task: AsyncTask = decode(
            self.client.post(SERVER_PROFILES_URI, &profile).await?,
            SERVER_PROFILES_URI,
        )?;
        if task.uri.is_empty() {
            return Err(HardwareError::Decode(
                "profile creation returned no task".to_string(),
            ));
        }

        let profile_uri = self.wait_for_assignment(&task.uri).await?;
        info!(hardware_uri, profile_uri = %profile_uri, "Profile assigned from template");
        Ok(profile_uri)
    }

    #[instrument(skip(self))]
    async fn clone_and_assign_profile(
        &self,
        hardware_uri: &str,
        template_uri: &str,
        name: &str,
    ) -> HardwareResult<String> {
        let template = self.get_profile_template(template_uri).await?;
        let hardware = self.get_hardware_record(hardware_uri).await?;

        let mut volumes = HashMap::new();
        for volume_uri in volume_uris(&template) {
            let volume = self.get_resource(&volume_uri).await?;
            volumes.insert(volume_uri, volume);
        }

        let body = build_clone_body(&template, &hardware.uri, name, &volumes)?;
        let response = self.client.post(SERVER_PROFILES_URI, &body).await?;
        if response.get("taskStatus").is_none() {
            return Err(HardwareError::ProfileCloneFailed(format!(
                "no task accepted for {}",
                hardware_uri
            )));
        }

        let hardware = self
            .wait_for_hardware_state(hardware_uri, AssignmentState::ProfileApplied)
            .await?;
        let profile_uri = hardware
            .profile_uri()
            .map(str::to_string)
            .ok_or_else(|| HardwareError::ResourceNotFound(format!("profile on {}", hardware_uri)))?;
        info!(hardware_uri, profile_uri = %profile_uri, "Cloned profile applied");
        Ok(profile_uri)
    }

    #[instrument(skip(self))]
    async fn unassign_profile(&self, hardware_uri: &str, profile_uri: &str) -> HardwareResult<()> {
        let mut profile = self.get_resource(profile_uri).await?;
        if let Some(fields) = profile.as_object_mut() {
            fields.insert("serverHardwareUri".into(), Value::Null);
            fields.insert("enclosureUri".into(), Value::Null);
            fields.insert("enclosureBay".into(), Value::Null);
        }
        self.client.put(profile_uri, &profile).await?;

        self.wait_for_hardware_state(hardware_uri, AssignmentState::NoProfileApplied)
            .await?;
        info!(hardware_uri, profile_uri, "Profile removed");
        Ok(())
    }

    #[instrument(skip(self, hardware), fields(hardware_uri = %hardware.uri))]
    async fn derive_mac(&self, hardware: &HardwareRecord) -> HardwareResult<String> {
        if let Some(mac) = hardware.first_port_mac() {
            return Ok(mac.to_string());
        }

        debug!("Port map has no MAC, asking the management processor");
        self.console_mac(hardware)
            .await?
            .ok_or_else(|| HardwareError::ResourceNotFound(format!("MAC of {}", hardware.uri)))
    }

    #[instrument(skip(self))]
    async fn list_available_hardware(
        &self,
        type_uri: &str,
        group_uri: Option<&str>,
    ) -> HardwareResult<Vec<HardwareRecord>> {
        let mut uri = format!(
            "{}?start=0&count=-1&filter=serverHardwareTypeUri='{}'",
            SERVER_HARDWARE_URI, type_uri
        );
        if let Some(group) = group_uri {
            uri.push_str(&format!("&filter=serverGroupUri='{}'", group));
        }

        let listing = self.client.get(&uri).await?;
        let members = listing.get("members").cloned().unwrap_or(Value::Array(Vec::new()));
        let records: Vec<HardwareRecord> = decode(members, SERVER_HARDWARE_URI)?;

        let mut available: Vec<HardwareRecord> = records
            .into_iter()
            .filter(|hw| hw.profile_uri().is_none())
            .filter(|hw| hw.server_hardware_type_uri.as_deref() == Some(type_uri))
            .filter(|hw| group_uri.map_or(true, |g| hw.server_group_uri.as_deref() == Some(g)))
            .collect();
        available.sort_by_key(|hw| hw.name.to_lowercase());
        Ok(available)
    }
}

fn decode<T: DeserializeOwned>(value: Value, uri: &str) -> HardwareResult<T> {
    serde_json::from_value(value).map_err(|e| HardwareError::Decode(format!("{}: {}", uri, e)))
}
