//! Route endpoints.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use tracing::{info, instrument};

use super::AppState;
use super::body::parse_json;
use super::error::ApiError;
use crate::storage::{NewRoute, Route, RouteWithOrigin};
use crate::validate::{normalize_hostname, validate_route};

/// Body of `POST /api/v1/routes`.
///
/// `target_port` is wide so out-of-range values reach validation instead of
/// failing to decode.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateRouteRequest {
    pub hostname: String,
    pub origin_id: String,
    pub target_port: i64,
}

/// `POST /api/v1/routes`
#[instrument(skip_all)]
pub async fn create_route(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Route>), ApiError> {
    let req: CreateRouteRequest = parse_json(&headers, &body)?;
    let target_port = validate_route(&req.hostname, req.target_port, &req.origin_id)?;
    let hostname = normalize_hostname(&req.hostname).to_string();

    let route = state
        .db
        .create_route(NewRoute {
            hostname,
            origin_id: req.origin_id,
            target_port,
        })
        .await?;

    info!(
        route_id = %route.id,
        hostname = %route.hostname,
        origin_id = %route.origin_id,
        target_port,
        "Route created"
    );
    Ok((StatusCode::CREATED, Json(route)))
}

/// `GET /api/v1/routes/list`: joined with origins, sorted by hostname.
pub async fn list_routes(
    State(state): State<AppState>,
) -> Result<Json<Vec<RouteWithOrigin>>, ApiError> {
    let mut routes = state.db.list_routes_joined().await?;
    routes.sort_by(|a, b| a.hostname.cmp(&b.hostname));
    Ok(Json(routes))
}
