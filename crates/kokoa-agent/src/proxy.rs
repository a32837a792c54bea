//! Local reverse proxy control: syntax checks and reloads.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::AgentError;

/// The proxy whose routing map the agent manages.
#[async_trait]
pub trait ProxyController: Send + Sync {
    /// Check that `map` is accepted by the proxy without applying it.
    async fn validate(&self, map: &str) -> Result<(), AgentError>;

    /// Ask the running proxy to pick up the committed map.
    async fn reload(&self) -> Result<(), AgentError>;
}

#[async_trait]
impl<T: ProxyController + ?Sized> ProxyController for Arc<T> {
    async fn validate(&self, map: &str) -> Result<(), AgentError> {
        (**self).validate(map).await
    }

    async fn reload(&self) -> Result<(), AgentError> {
        (**self).reload().await
    }
}

/// Drives the `nginx` binary.
#[derive(Debug, Clone)]
pub struct NginxController {
    binary: PathBuf,
}

impl NginxController {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&OsStr]) -> Result<Output, AgentError> {
        debug!(binary = %self.binary.display(), ?args, "Running nginx");
        Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                AgentError::Proxy(format!("failed to run {}: {e}", self.binary.display()))
            })
    }
}

/// Minimal standalone nginx config that includes the candidate map.
fn harness_config(dir: &Path, candidate: &Path) -> String {
    format!(
        "pid {pid};\nerror_log stderr;\nevents {{}}\nhttp {{\n    include {map};\n}}\n",
        pid = dir.join("nginx.pid").display(),
        map = candidate.display(),
    )
}

fn failure(what: &str, output: &Output) -> AgentError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    AgentError::Proxy(format!("{what} failed ({}): {}", output.status, stderr.trim()))
}

#[async_trait]
impl ProxyController for NginxController {
    async fn validate(&self, map: &str) -> Result<(), AgentError> {
        let dir = tempfile::tempdir()?;
        let candidate = dir.path().join("kokoa_map.conf");
        let conf = dir.path().join("nginx.conf");
        std::fs::write(&candidate, map)?;
        std::fs::write(&conf, harness_config(dir.path(), &candidate))?;

        let output = self
            .run(&[
                OsStr::new("-t"),
                OsStr::new("-q"),
                OsStr::new("-p"),
                dir.path().as_os_str(),
                OsStr::new("-c"),
                conf.as_os_str(),
            ])
            .await?;
        if output.status.success() {
            debug!("Candidate map passed nginx syntax check");
            Ok(())
        } else {
            Err(failure("nginx -t", &output))
        }
    }

    async fn reload(&self) -> Result<(), AgentError> {
        let output = self.run(&[OsStr::new("-s"), OsStr::new("reload")]).await?;
        if output.status.success() {
            info!("nginx reloaded");
            Ok(())
        } else {
            Err(failure("nginx -s reload", &output))
        }
    }
}
