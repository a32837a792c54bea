//! Data models for control plane storage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Origin {
    pub id: String,
    pub name: String,
    pub wg_ip: String,
    pub wireguard_public_key: Option<String>,
    /// Opaque ciphertext; the control plane never decrypts it.
    pub wireguard_private_key_encrypted: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Route {
    pub id: String,
    pub hostname: String,
    pub origin_id: String,
    pub target_port: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EdgeNode {
    pub id: String,
    pub name: Option<String>,
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    pub wg_addr: Option<String>,
    pub wg_endpoint: Option<String>,
    pub wg_peer_pubkey: Option<String>,
    pub wg_allowed_ips: Option<String>,
    pub created_at: i64,
    pub last_seen: Option<i64>,
}

/// Parameters for creating an origin.
#[derive(Debug, Clone, Default)]
pub struct NewOrigin {
    pub name: String,
    pub wg_ip: String,
    pub wireguard_public_key: Option<String>,
    pub wireguard_private_key_encrypted: Option<String>,
}

/// Parameters for creating a route.
#[derive(Debug, Clone)]
pub struct NewRoute {
    pub hostname: String,
    pub origin_id: String,
    pub target_port: u16,
}
