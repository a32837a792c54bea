//! Origin endpoints.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use tracing::{info, instrument};

use super::AppState;
use super::body::parse_json;
use super::error::ApiError;
use crate::storage::{NewOrigin, Origin};
use crate::validate::validate_origin;

/// Body of `POST /api/v1/origins`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateOriginRequest {
    pub name: String,
    pub wg_ip: String,
    pub wireguard_public_key: Option<String>,
    pub wireguard_private_key_encrypted: Option<String>,
}

/// `POST /api/v1/origins`
#[instrument(skip_all)]
pub async fn create_origin(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Origin>), ApiError> {
    let req: CreateOriginRequest = parse_json(&headers, &body)?;
    validate_origin(&req.name, &req.wg_ip)?;

    let origin = state
        .db
        .create_origin(NewOrigin {
            name: req.name.trim().to_string(),
            wg_ip: req.wg_ip,
            wireguard_public_key: non_empty(req.wireguard_public_key),
            wireguard_private_key_encrypted: non_empty(req.wireguard_private_key_encrypted),
        })
        .await?;

    info!(origin_id = %origin.id, name = %origin.name, wg_ip = %origin.wg_ip, "Origin created");
    Ok((StatusCode::CREATED, Json(origin)))
}

/// `GET /api/v1/origins/list`: newest first.
pub async fn list_origins(State(state): State<AppState>) -> Result<Json<Vec<Origin>>, ApiError> {
    Ok(Json(state.db.list_origins().await?))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
