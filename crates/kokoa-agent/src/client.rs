//! Control plane HTTP client.
//!
//! Uses reqwest to enroll edge nodes and to fetch the rendered proxy config.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kokoa_core::fingerprint;
use kokoa_core::wire::{
    BOOTSTRAP_HEADER, CONFIG_PATH, ENROLL_PATH, EdgeConfigResponse, EnrollRequest, EnrollResponse,
    ErrorBody,
};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::AgentError;

/// Anything the poller can fetch a candidate configuration from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch the current configuration.
    async fn fetch_config(&self) -> Result<EdgeConfigResponse, AgentError>;
}

#[async_trait]
impl<T: ConfigSource + ?Sized> ConfigSource for Arc<T> {
    async fn fetch_config(&self) -> Result<EdgeConfigResponse, AgentError> {
        (**self).fetch_config().await
    }
}

/// Control plane REST client.
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: String,
    node_token: Option<String>,
}

impl std::fmt::Debug for ControlPlaneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlaneClient")
            .field("base_url", &self.base_url)
            .field("node_token", &self.node_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl ControlPlaneClient {
    /// Create a new client. `timeout` bounds every request end to end.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        // Ensure a TLS crypto provider is installed (reqwest uses rustls-no-provider).
        // The `Err` case just means it was already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kokoa-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Self::with_http_client(base_url, http)
    }

    /// Wrap an already configured HTTP client.
    pub fn with_http_client(base_url: &str, http: reqwest::Client) -> Result<Self, AgentError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(AgentError::Config("control plane URL is empty".into()));
        }
        Ok(Self {
            http,
            base_url,
            node_token: None,
        })
    }

    /// Attach the node token used to authenticate config polls.
    #[must_use]
    pub fn with_node_token(mut self, token: impl Into<String>) -> Self {
        self.node_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map non-success responses to agent errors, keeping the API's message.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, AgentError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("Unknown").into(),
        };
        if status == StatusCode::UNAUTHORIZED {
            return Err(AgentError::Unauthorized(message));
        }
        Err(AgentError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Enroll this host with the bootstrap secret and return the issued
    /// node credential.
    pub async fn enroll(
        &self,
        bootstrap_token: &str,
        name: Option<&str>,
    ) -> Result<EnrollResponse, AgentError> {
        let body = EnrollRequest {
            name: name.map(str::to_string),
        };
        let resp = self
            .http
            .post(self.url(ENROLL_PATH))
            .header(BOOTSTRAP_HEADER, bootstrap_token)
            .json(&body)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ConfigSource for ControlPlaneClient {
    async fn fetch_config(&self) -> Result<EdgeConfigResponse, AgentError> {
        let token = self
            .node_token
            .as_deref()
            .ok_or_else(|| AgentError::Config("node token is not set".into()))?;

        let resp = self
            .http
            .get(self.url(CONFIG_PATH))
            .bearer_auth(token)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        let config: EdgeConfigResponse = resp.json().await?;

        debug!(
            config_hash = %config.config_hash,
            routes = config.routes.len(),
            "Fetched edge config"
        );
        Ok(config)
    }
}

/// Check that the map body hashes to the advertised fingerprint.
pub fn verify_integrity(config: &EdgeConfigResponse) -> Result<(), AgentError> {
    let actual = fingerprint(config.nginx_map.as_bytes());
    if actual == config.config_hash {
        Ok(())
    } else {
        Err(AgentError::Integrity {
            expected: config.config_hash.clone(),
            actual,
        })
    }
}
