//! Edge node enrollment, listing and configuration polling.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use kokoa_core::db::{DatabaseError, unix_timestamp};
use kokoa_core::proxy_map::build_config;
use kokoa_core::wire::{EdgeConfigResponse, EnrollRequest, EnrollResponse};
use tracing::{debug, info, instrument, warn};

use super::AppState;
use super::body::{parse_json, require_json_content_type};
use super::error::ApiError;
use crate::auth::bearer_token;
use crate::auth::bootstrap::BootstrapCheck;
use crate::storage::EdgeNode;

/// `POST /api/v1/edge-nodes/register`: bootstrap credential required.
///
/// The plaintext token in the response is never stored or logged.
#[instrument(skip_all)]
pub async fn register_edge_node(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<EnrollResponse>), ApiError> {
    match state.bootstrap.check(&headers) {
        BootstrapCheck::Disabled => return Err(ApiError::BootstrapDisabled),
        BootstrapCheck::Rejected => {
            warn!("Enrollment rejected: invalid bootstrap token");
            return Err(ApiError::Unauthorized("invalid bootstrap token"));
        }
        BootstrapCheck::Accepted => {}
    }

    let req: EnrollRequest = if body.iter().all(u8::is_ascii_whitespace) {
        require_json_content_type(&headers)?;
        EnrollRequest::default()
    } else {
        parse_json(&headers, &body)?
    };

    let (node, token) = state.db.register_edge_node(req.name.as_deref()).await?;
    info!(edge_node_id = %node.id, name = ?node.name, "Edge node enrolled");

    Ok((
        StatusCode::CREATED,
        Json(EnrollResponse {
            edge_node_id: node.id,
            token,
        }),
    ))
}

/// `GET /api/v1/edge-nodes/me/config`: node token required.
///
/// Recomputed from the store on every call. Recording `last_seen` is best
/// effort and never fails the response.
#[instrument(skip_all)]
pub async fn edge_config(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<EdgeConfigResponse>, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::Unauthorized("missing bearer token"))?;

    let node = match state.db.edge_node_by_token(token).await {
        Ok(node) => node,
        Err(DatabaseError::NotFound(_)) => {
            warn!("Config poll rejected: unknown token");
            return Err(ApiError::Unauthorized("invalid token"));
        }
        Err(e) => return Err(e.into()),
    };

    let db = state.db.clone();
    let node_id = node.id.clone();
    tokio::spawn(async move {
        if let Err(e) = db.touch_edge_node(&node_id, unix_timestamp()).await {
            warn!(edge_node_id = %node_id, error = %e, "Failed to record last_seen");
        }
    });

    let routes = state.db.list_routes_joined().await?;
    let config = build_config(&routes);
    debug!(
        edge_node_id = %node.id,
        config_hash = %config.config_hash,
        routes = config.routes.len(),
        "Serving edge config"
    );

    Ok(Json(config.into()))
}

/// `GET /api/v1/edge-nodes/list`: newest first, token hashes omitted.
pub async fn list_edge_nodes(
    State(state): State<AppState>,
) -> Result<Json<Vec<EdgeNode>>, ApiError> {
    Ok(Json(state.db.list_edge_nodes().await?))
}
