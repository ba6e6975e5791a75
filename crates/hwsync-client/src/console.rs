//! Out-of-band console MAC lookup
//!
//! Used when a hardware record's port map carries no MAC. The Hardware
//! Manager hands out a remote console URL holding the management
//! processor's address and a session key; the management processor then
//! reports the host's MAC.

use crate::error::{HardwareError, HardwareResult};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Address and session key parsed from a remote console URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEndpoint {
    pub address: String,
    pub session_key: String,
}

impl ConsoleEndpoint {
    /// Parse `scheme://addr=<host>&sessionkey=<key>`
    pub fn parse(url: &str) -> Option<Self> {
        let params = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);

        let mut address = None;
        let mut session_key = None;
        for pair in params.split('&') {
            match pair.split_once('=') {
                Some(("addr", value)) if !value.is_empty() => address = Some(value.to_string()),
                Some(("sessionkey", value)) if !value.is_empty() => {
                    session_key = Some(value.to_string())
                }
                _ => {}
            }
        }

        Some(Self {
            address: address?,
            session_key: session_key?,
        })
    }
}

/// Source of a host MAC reachable through the management processor
#[async_trait]
pub trait ConsoleMacSource: Send + Sync {
    /// Host MAC, or `None` if the management processor reports none
    async fn host_mac(&self, endpoint: &ConsoleEndpoint) -> HardwareResult<Option<String>>;
}

/// iLO REST lookup: `GET /rest/v1/Systems/1`, first
/// `HostCorrelation.HostMACAddress`
#[derive(Debug, Clone)]
pub struct IloConsole {
    http: reqwest::Client,
    scheme: &'static str,
}

impl IloConsole {
    pub fn new(allow_insecure_connections: bool) -> HardwareResult<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(allow_insecure_connections)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HardwareError::Config(e.to_string()))?;
        Ok(Self {
            http,
            scheme: "https",
        })
    }

    /// Talk plain HTTP to the management processor
    pub fn with_plain_http(mut self) -> Self {
        self.scheme = "http";
        self
    }
}

#[async_trait]
impl ConsoleMacSource for IloConsole {
    async fn host_mac(&self, endpoint: &ConsoleEndpoint) -> HardwareResult<Option<String>> {
        let url = format!("{}://{}/rest/v1/Systems/1", self.scheme, endpoint.address);
        debug!(address = %endpoint.address, "Reading host MAC from management processor");

        let response = self
            .http
            .get(&url)
            .header("X-Auth-Token", &endpoint.session_key)
            .send()
            .await
            .map_err(|e| HardwareError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let system: Value = response
            .json()
            .await
            .map_err(|e| HardwareError::Decode(e.to_string()))?;

        Ok(system
            .pointer("/HostCorrelation/HostMACAddress/0")
            .and_then(Value::as_str)
            .filter(|mac| !mac.is_empty())
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_console_url() {
        let endpoint =
            ConsoleEndpoint::parse("hplocons://addr=10.0.0.5&sessionkey=abc123").unwrap();
        assert_eq!(endpoint.address, "10.0.0.5");
        assert_eq!(endpoint.session_key, "abc123");
    }

    #[test]
    fn test_parse_console_url_missing_key() {
        assert!(ConsoleEndpoint::parse("hplocons://addr=10.0.0.5").is_none());
        assert!(ConsoleEndpoint::parse("hplocons://sessionkey=abc").is_none());
        assert!(ConsoleEndpoint::parse("").is_none());
    }
}
