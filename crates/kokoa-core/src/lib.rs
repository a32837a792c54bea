//! Kokoa Core Library
//!
//! Shared functionality for Kokoa components:
//! - Deterministic nginx map generation and content fingerprints
//! - Wire types exchanged between the control plane and edge agents
//! - `SQLite` pool helpers and the shared database error type
//! - Tracing initialization

pub mod db;
pub mod proxy_map;
pub mod tracing_init;
pub mod wire;

pub use proxy_map::{ProxyConfig, RouteWithOrigin, build_config, fingerprint};
