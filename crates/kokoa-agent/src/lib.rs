//! Kokoa Edge Agent Library
//!
//! Keeps an edge host's nginx routing map in sync with the control plane:
//! - Authenticated polling of the rendered map and its fingerprint
//! - Integrity and syntax checks before anything touches disk
//! - Atomic map and fingerprint commits followed by a proxy reload
//! - Exponential backoff on failure

pub mod client;
pub mod config;
pub mod error;
pub mod poller;
pub mod proxy;
pub mod state;

pub use client::{ConfigSource, ControlPlaneClient};
pub use config::{AgentConfig, BackoffPolicy};
pub use error::AgentError;
pub use poller::{PollOutcome, PollState, Poller};
pub use proxy::{NginxController, ProxyController};
pub use state::LocalState;
