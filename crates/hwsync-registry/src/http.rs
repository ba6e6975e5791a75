//! Node Registry over the Ironic v1 REST API

use crate::error::{RegistryError, RegistryResult};
use crate::traits::NodeRegistry;
use async_trait::async_trait;
use hwsync_types::{Node, NodeId, Port, PortId, ProvisionTarget};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};

/// Header carrying the requested microversion
pub const API_VERSION_HEADER: &str = "X-OpenStack-Ironic-API-Version";

/// Settings for [`HttpRegistry`]
#[derive(Debug, Clone)]
pub struct HttpRegistryConfig {
    /// Base URL, e.g. `http://ironic.example:6385`
    pub url: String,
    /// Pre-issued token sent as `X-Auth-Token`
    pub auth_token: Option<String>,
    pub api_version: String,
    pub insecure: bool,
    pub timeout: Duration,
}

impl Default for HttpRegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:6385".to_string(),
            auth_token: None,
            api_version: "1.22".to_string(),
            insecure: false,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Deserialize)]
struct NodeList {
    nodes: Vec<Node>,
}

#[derive(Deserialize)]
struct PortList {
    ports: Vec<Port>,
}

/// HTTP Node Registry client
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    http: reqwest::Client,
    base_url: String,
    config: HttpRegistryConfig,
}

impl HttpRegistry {
    pub fn new(config: HttpRegistryConfig) -> RegistryResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| RegistryError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            config,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header(API_VERSION_HEADER, &self.config.api_version);
        if let Some(token) = &self.config.auth_token {
            request = request.header("X-Auth-Token", token);
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> RegistryResult<String> {
        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::Connection(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RegistryError::Connection(e.to_string()))?;

        if status.is_success() {
            return Ok(body);
        }

        let message = error_message(&body);
        Err(match status.as_u16() {
            404 => RegistryError::NotFound(message),
            409 => RegistryError::Conflict(message),
            code => RegistryError::Api {
                status: code,
                message,
            },
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> RegistryResult<T> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| RegistryError::Decode(e.to_string()))
    }
}

/// Ironic wraps errors as `{"error_message": "<json string>"}` whose inner
/// document carries a `faultstring`
fn error_message(body: &str) -> String {
    let outer: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return body.to_string(),
    };
    let inner = match outer.get("error_message") {
        Some(Value::String(s)) => serde_json::from_str::<Value>(s).unwrap_or(Value::String(s.clone())),
        Some(other) => other.clone(),
        None => return body.to_string(),
    };
    match inner.get("faultstring").and_then(Value::as_str) {
        Some(fault) => fault.to_string(),
        None => inner.as_str().map(str::to_string).unwrap_or_else(|| inner.to_string()),
    }
}

#[async_trait]
impl NodeRegistry for HttpRegistry {
    async fn list_nodes(&self) -> RegistryResult<Vec<Node>> {
        let list: NodeList = self
            .fetch(self.request(Method::GET, "/v1/nodes").query(&[("detail", "True")]))
            .await?;
        debug!(count = list.nodes.len(), "Listed nodes");
        Ok(list.nodes)
    }

    async fn get_node(&self, id: &NodeId) -> RegistryResult<Node> {
        self.fetch(self.request(Method::GET, &format!("/v1/nodes/{}", id)))
            .await
    }

    #[instrument(skip_all, fields(node_id = %node_id, provision_target = %target))]
    async fn set_provision_state(
        &self,
        node_id: &NodeId,
        target: ProvisionTarget,
    ) -> RegistryResult<()> {
        let request = self
            .request(
                Method::PUT,
                &format!("/v1/nodes/{}/states/provision", node_id),
            )
            .json(&json!({ "target": target.as_str() }));
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, local_link_connection), fields(node_id = %node_id))]
    async fn create_port(
        &self,
        node_id: &NodeId,
        mac: &str,
        local_link_connection: Option<Map<String, Value>>,
    ) -> RegistryResult<Port> {
        let mut body = json!({
            "node_uuid": node_id.as_str(),
            "address": mac,
        });
        if let Some(link) = local_link_connection {
            body["local_link_connection"] = Value::Object(link);
        }
        self.fetch(self.request(Method::POST, "/v1/ports").json(&body))
            .await
    }

    async fn list_ports_by_mac(&self, mac: &str) -> RegistryResult<Vec<Port>> {
        let list: PortList = self
            .fetch(
                self.request(Method::GET, "/v1/ports")
                    .query(&[("address", mac), ("detail", "True")]),
            )
            .await?;
        Ok(list.ports)
    }

    async fn get_port(&self, id: &PortId) -> RegistryResult<Port> {
        self.fetch(self.request(Method::GET, &format!("/v1/ports/{}", id)))
            .await
    }
}
