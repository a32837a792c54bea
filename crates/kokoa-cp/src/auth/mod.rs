//! Authentication for the Kokoa control plane.
//!
//! Two independent tiers:
//! - a bootstrap secret that only gates edge node enrollment
//! - per-node opaque bearer tokens, stored as SHA-256 hashes

pub mod bootstrap;
pub mod node_token;

pub use bootstrap::BootstrapSecret;
pub use node_token::{IssuedToken, bearer_token, hash_token, issue_token};
