//! Database queries for the Kokoa control plane.

use kokoa_core::db::unix_timestamp;
use kokoa_core::proxy_map::RouteWithOrigin;
use tracing::debug;

use super::db::ControlPlaneDatabase;
use super::models::{EdgeNode, NewOrigin, NewRoute, Origin, Route};
use crate::auth::node_token::{hash_token, issue_token};
use kokoa_core::db::DatabaseError;

impl ControlPlaneDatabase {
    // =========================================================================
    // Origin queries
    // =========================================================================

    /// Create an origin. Duplicate name or address yields `Conflict`.
    pub async fn create_origin(&self, params: NewOrigin) -> Result<Origin, DatabaseError> {
        let _writer = self.writer().await;

        let origin = Origin {
            id: uuid::Uuid::new_v4().to_string(),
            name: params.name,
            wg_ip: params.wg_ip,
            wireguard_public_key: params.wireguard_public_key,
            wireguard_private_key_encrypted: params.wireguard_private_key_encrypted,
            created_at: unix_timestamp(),
        };

        sqlx::query(
            "INSERT INTO origins (id, name, wg_ip, wireguard_public_key, wireguard_private_key_encrypted, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&origin.id)
        .bind(&origin.name)
        .bind(&origin.wg_ip)
        .bind(&origin.wireguard_public_key)
        .bind(&origin.wireguard_private_key_encrypted)
        .bind(origin.created_at)
        .execute(self.pool())
        .await?;

        Ok(origin)
    }

    /// Get an origin by ID.
    pub async fn get_origin(&self, id: &str) -> Result<Origin, DatabaseError> {
        sqlx::query_as::<_, Origin>("SELECT * FROM origins WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Origin {id}")))
    }

    /// List origins, newest first.
    pub async fn list_origins(&self) -> Result<Vec<Origin>, DatabaseError> {
        let origins = sqlx::query_as::<_, Origin>(
            "SELECT * FROM origins ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(origins)
    }

    // =========================================================================
    // Route queries
    // =========================================================================

    /// Create a route for an existing origin.
    ///
    /// The origin lookup and the insert share one transaction, so a missing
    /// origin performs no write.
    pub async fn create_route(&self, params: NewRoute) -> Result<Route, DatabaseError> {
        let _writer = self.writer().await;
        let mut tx = self.pool().begin().await?;

        let origin: Option<(String,)> = sqlx::query_as("SELECT id FROM origins WHERE id = ?")
            .bind(&params.origin_id)
            .fetch_optional(&mut *tx)
            .await?;
        if origin.is_none() {
            return Err(DatabaseError::NotFound(format!(
                "Origin {}",
                params.origin_id
            )));
        }

        let route = Route {
            id: uuid::Uuid::new_v4().to_string(),
            hostname: params.hostname,
            origin_id: params.origin_id,
            target_port: i64::from(params.target_port),
            created_at: unix_timestamp(),
        };

        sqlx::query(
            "INSERT INTO routes (id, hostname, origin_id, target_port, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&route.id)
        .bind(&route.hostname)
        .bind(&route.origin_id)
        .bind(route.target_port)
        .bind(route.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(route)
    }

    /// Routes joined with their origins. Routes without an origin never
    /// appear. Rows come back in no particular order.
    pub async fn list_routes_joined(&self) -> Result<Vec<RouteWithOrigin>, DatabaseError> {
        let routes = sqlx::query_as::<_, RouteWithOrigin>(
            "SELECT r.hostname, r.target_port, r.origin_id, o.name AS origin_name, o.wg_ip
             FROM routes r
             INNER JOIN origins o ON r.origin_id = o.id",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(routes)
    }

    // =========================================================================
    // Edge node queries
    // =========================================================================

    /// Register an edge node and issue its token.
    ///
    /// Returns the plaintext token alongside the row; only the hash is stored
    /// and the plaintext cannot be recovered later.
    pub async fn register_edge_node(
        &self,
        name: Option<&str>,
    ) -> Result<(EdgeNode, String), DatabaseError> {
        let _writer = self.writer().await;

        let issued = issue_token();
        let node = EdgeNode {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.map(str::trim).filter(|n| !n.is_empty()).map(String::from),
            token_hash: issued.hash,
            wg_addr: None,
            wg_endpoint: None,
            wg_peer_pubkey: None,
            wg_allowed_ips: None,
            created_at: unix_timestamp(),
            last_seen: None,
        };

        sqlx::query(
            "INSERT INTO edge_nodes (id, name, token_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&node.id)
        .bind(&node.name)
        .bind(&node.token_hash)
        .bind(node.created_at)
        .execute(self.pool())
        .await?;

        Ok((node, issued.plaintext))
    }

    /// Resolve an edge node from a presented plaintext token.
    pub async fn edge_node_by_token(&self, token: &str) -> Result<EdgeNode, DatabaseError> {
        let token_hash = hash_token(token);
        sqlx::query_as::<_, EdgeNode>("SELECT * FROM edge_nodes WHERE token_hash = ?")
            .bind(&token_hash)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Edge node".into()))
    }

    /// Get an edge node by ID.
    pub async fn get_edge_node(&self, id: &str) -> Result<EdgeNode, DatabaseError> {
        sqlx::query_as::<_, EdgeNode>("SELECT * FROM edge_nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Edge node {id}")))
    }

    /// List edge nodes, newest first.
    pub async fn list_edge_nodes(&self) -> Result<Vec<EdgeNode>, DatabaseError> {
        let nodes = sqlx::query_as::<_, EdgeNode>(
            "SELECT * FROM edge_nodes ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(nodes)
    }

    /// Update an edge node's `last_seen` timestamp.
    pub async fn touch_edge_node(&self, id: &str, at: i64) -> Result<(), DatabaseError> {
        let _writer = self.writer().await;

        let result = sqlx::query("UPDATE edge_nodes SET last_seen = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Edge node {id}")));
        }
        debug!(edge_node_id = %id, at, "Edge node touched");
        Ok(())
    }
}
