//! Edge agent configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AgentError;

/// Default location of the rendered map on an edge host.
pub const DEFAULT_MAP_PATH: &str = "/etc/nginx/conf.d/kokoa_map.conf";

/// Configuration for the agent's polling loop.
///
/// The node token is held by the client, not here, so this struct can be
/// logged freely.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Control plane base URL (e.g., "<https://cp.example.com>").
    pub control_plane: String,

    /// Where the applied nginx map is written.
    pub map_path: PathBuf,

    /// Where the fingerprint of the applied map is recorded.
    pub hash_path: PathBuf,

    /// nginx binary used for syntax checks and reloads.
    pub nginx_bin: PathBuf,

    /// Delay between polls while the control plane is reachable.
    pub poll_interval: Duration,

    /// Per-request HTTP timeout.
    pub request_timeout: Duration,

    /// Backoff applied after failed or rejected polls.
    pub backoff: BackoffPolicy,
}

impl AgentConfig {
    /// Create a config with the given control plane URL and defaults elsewhere.
    pub fn new(control_plane: impl Into<String>) -> Self {
        let map_path = PathBuf::from(DEFAULT_MAP_PATH);
        Self {
            control_plane: control_plane.into(),
            hash_path: default_hash_path(&map_path),
            map_path,
            nginx_bin: PathBuf::from("nginx"),
            poll_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
        }
    }

    /// Reject configurations the agent cannot run with.
    pub fn validate(&self) -> Result<(), AgentError> {
        let url = self.control_plane.trim();
        if url.is_empty() {
            return Err(AgentError::Config("control plane URL is empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AgentError::Config(format!(
                "control plane URL must start with http:// or https://: {url}"
            )));
        }
        if self.map_path == self.hash_path {
            return Err(AgentError::Config(
                "map path and hash path must differ".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(AgentError::Config("poll interval must be positive".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(AgentError::Config("request timeout must be positive".into()));
        }
        if self.backoff.initial_delay > self.backoff.max_delay {
            return Err(AgentError::Config(
                "initial backoff exceeds maximum backoff".into(),
            ));
        }
        Ok(())
    }
}

/// Fingerprint file kept next to the map: `<map>.sha256`.
pub fn default_hash_path(map_path: &Path) -> PathBuf {
    let mut name = map_path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Exponential backoff between failed polls.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Multiplier applied after each consecutive failure.
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Calculate the delay for a given attempt number (0-indexed).
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }
}
