//! Kokoa Control Plane Library
//!
//! Core functionality for the Kokoa control plane:
//! - SQLite storage for origins, routes and edge nodes
//! - Bootstrap and per-node token authentication
//! - HTTP JSON API serving deterministic nginx maps to edge agents
//! - Per-address rate limiting

pub mod auth;
pub mod http;
pub mod storage;
pub mod validate;
