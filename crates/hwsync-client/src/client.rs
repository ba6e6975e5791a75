//! Resilient HTTP client for the Hardware Manager
//!
//! Every call goes through one loop that owns authentication, status
//! handling and the retry budget:
//!
//! | status | handling |
//! |---|---|
//! | 200, 202 | success, body decoded (empty body is `null`) |
//! | 401 | cached session dropped, retried |
//! | 409 | success for a benign error code, else conflict backoff and retry |
//! | 404, 500 | logged; retried or failed per [`ServerErrorPolicy`] |
//! | other | logged as unrecognized, treated as success |
//!
//! A body that is not JSON is retried after the retry backoff. A transport
//! failure is returned immediately as [`HardwareError::Connection`].

use crate::config::{ClientConfig, ServerErrorPolicy};
use crate::error::{HardwareError, HardwareResult};
use crate::session::{SessionCache, SessionToken};
use hwsync_types::AsyncTask;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Login endpoint
pub const LOGIN_URI: &str = "/rest/login-sessions";

/// What the status handling decided for one HTTP exchange
#[derive(Debug)]
enum Verdict {
    Success(Value),
    Unauthorized,
    Retry(Duration),
}

/// Hardware Manager client with a shared session and a bounded retry loop
#[derive(Debug)]
pub struct HardwareClient {
    http: reqwest::Client,
    config: ClientConfig,
    base_url: String,
    session: SessionCache,
}

impl HardwareClient {
    /// Build a client; fails if the CA bundle cannot be read or the HTTP
    /// client cannot be constructed
    pub fn new(config: ClientConfig) -> HardwareResult<Self> {
        if config.url.is_empty() {
            return Err(HardwareError::Config(
                "Hardware Manager url is not set".to_string(),
            ));
        }

        let mut builder = reqwest::Client::builder().timeout(config.request_timeout);

        if config.allow_insecure_connections {
            warn!("Using insecure connection to Hardware Manager");
            builder = builder.danger_accept_invalid_certs(true);
        } else if let Some(path) = &config.tls_cacert_file {
            let pem = std::fs::read(path).map_err(|e| {
                HardwareError::Config(format!("Cannot read CA bundle {}: {}", path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| HardwareError::Config(format!("Invalid CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|e| HardwareError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            config,
            session: SessionCache::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionCache {
        &self.session
    }

    /// Return the cached session token, logging in if there is none
    pub async fn authenticate(&self) -> HardwareResult<SessionToken> {
        self.session.get_or_refresh(|| self.login()).await
    }

    pub async fn get(&self, uri: &str) -> HardwareResult<Value> {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> HardwareResult<Value> {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: &Value) -> HardwareResult<Value> {
        self.request(Method::PUT, uri, Some(body)).await
    }

    /// Issue a request with the configured API version
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
    ) -> HardwareResult<Value> {
        let api_version = self.config.api_version.clone();
        self.request_with_version(method, uri, body, &api_version)
            .await
    }

    /// Issue an authenticated request and run it through the retry loop
    #[instrument(skip_all, fields(method = %method, uri = %uri))]
    pub async fn request_with_version(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
        api_version: &str,
    ) -> HardwareResult<Value> {
        self.exchange(method, uri, body, api_version).await
    }

    /// Poll a task until it has an associated resource, reports errors, or
    /// `max_wait` elapses, then return a final snapshot.
    ///
    /// The caller decides whether the snapshot means success.
    #[instrument(skip(self))]
    pub async fn wait_for_task(&self, task_uri: &str, max_wait: Duration) -> HardwareResult<AsyncTask> {
        let deadline = Instant::now() + max_wait;

        loop {
            let task = self.fetch_task(task_uri).await?;
            if task.is_settled() || Instant::now() >= deadline {
                debug!(state = ?task.task_state, settled = task.is_settled(), "Task snapshot");
                return Ok(task);
            }
            tokio::time::sleep(self.config.task_poll_interval).await;
        }
    }

    async fn fetch_task(&self, task_uri: &str) -> HardwareResult<AsyncTask> {
        let value = self.get(task_uri).await?;
        serde_json::from_value(value)
            .map_err(|e| HardwareError::Decode(format!("task {}: {}", task_uri, e)))
    }

    async fn login(&self) -> HardwareResult<String> {
        info!(username = %self.config.username, "Logging in to Hardware Manager");

        let url = self.url_for(LOGIN_URI);
        let body = json!({
            "userName": self.config.username,
            "password": self.config.password,
        });
        let mut retries = 0u32;

        loop {
            let (status, text) = self
                .send(Method::POST, &url, Some(&body), &self.config.api_version, None)
                .await?;

            let delay = match self.classify(status, &text)? {
                Verdict::Success(response) => {
                    return response
                        .get("sessionID")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .ok_or_else(|| {
                            HardwareError::NotAuthorized(
                                "login response carried no sessionID".to_string(),
                            )
                        })
                }
                Verdict::Unauthorized => {
                    return Err(HardwareError::NotAuthorized(format!(
                        "credentials rejected for user {}",
                        self.config.username
                    )))
                }
                Verdict::Retry(delay) => delay,
            };

            self.back_off(LOGIN_URI, &mut retries, delay).await?;
        }
    }

    async fn exchange(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
        api_version: &str,
    ) -> HardwareResult<Value> {
        let url = self.url_for(uri);
        let mut retries = 0u32;

        loop {
            let token = self.authenticate().await?;
            let (status, text) = self
                .send(method.clone(), &url, body, api_version, Some(token.value()))
                .await?;

            let delay = match self.classify(status, &text)? {
                Verdict::Success(value) => return Ok(value),
                Verdict::Unauthorized => {
                    debug!(generation = token.generation(), "Session rejected, re-authenticating");
                    self.session.invalidate(&token).await;
                    Duration::ZERO
                }
                Verdict::Retry(delay) => delay,
            };

            self.back_off(uri, &mut retries, delay).await?;
        }
    }

    async fn back_off(&self, uri: &str, retries: &mut u32, delay: Duration) -> HardwareResult<()> {
        *retries += 1;
        if *retries > self.config.max_retries {
            error!(uri, attempts = *retries, "Giving up on Hardware Manager request");
            return Err(HardwareError::MaxRetriesExceeded {
                uri: uri.to_string(),
                attempts: *retries,
            });
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        api_version: &str,
        token: Option<&str>,
    ) -> HardwareResult<(u16, String)> {
        let mut request = self
            .http
            .request(method, url)
            .header("X-Api-Version", api_version);
        if let Some(token) = token {
            request = request.header("Auth", token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Can't connect to Hardware Manager");
            HardwareError::Connection(e.to_string())
        })?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| HardwareError::Connection(e.to_string()))?;
        Ok((status, text))
    }

    fn classify(&self, status: u16, text: &str) -> HardwareResult<Verdict> {
        match status {
            401 => Ok(Verdict::Unauthorized),
            409 => {
                let body = match parse_body(text) {
                    Some(body) => body,
                    None => return Ok(self.malformed(status)),
                };
                let code = body.get("errorCode").and_then(Value::as_str).unwrap_or("");
                if self.config.is_benign_conflict(code) {
                    debug!(error_code = code, "Ignoring benign conflict");
                    Ok(Verdict::Success(body))
                } else {
                    debug!(error_code = code, "Conflict contacting Hardware Manager");
                    Ok(Verdict::Retry(self.config.conflict_backoff))
                }
            }
            404 | 500 => {
                error!(status, body = %text, "Error contacting Hardware Manager");
                match self.config.server_error_policy {
                    ServerErrorPolicy::FailFast => Err(HardwareError::Server {
                        status,
                        body: text.to_string(),
                    }),
                    ServerErrorPolicy::Retry => Ok(Verdict::Retry(self.config.retry_backoff)),
                }
            }
            _ => {
                if status != 200 && status != 202 {
                    warn!(status, body = %text, "Status not recognized");
                }
                match parse_body(text) {
                    Some(body) => Ok(Verdict::Success(body)),
                    None => Ok(self.malformed(status)),
                }
            }
        }
    }

    fn malformed(&self, status: u16) -> Verdict {
        warn!(status, "Malformed response body from Hardware Manager");
        Verdict::Retry(self.config.retry_backoff)
    }

    fn url_for(&self, uri: &str) -> String {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else {
            format!("{}{}", self.base_url, uri)
        }
    }
}

fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return Some(Value::Null);
    }
    serde_json::from_str(text).ok()
}
