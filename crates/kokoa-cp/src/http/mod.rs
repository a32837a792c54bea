//! HTTP JSON API for the Kokoa control plane.

pub mod body;
pub mod edge_nodes;
pub mod error;
pub mod health;
pub mod origins;
pub mod rate_limit;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use kokoa_core::wire::{CONFIG_PATH, ENROLL_PATH};
use tower_http::trace::TraceLayer;

use crate::auth::BootstrapSecret;
use crate::storage::ControlPlaneDatabase;

pub use error::ApiError;
pub use rate_limit::{RateLimitConfig, RateLimiter};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: ControlPlaneDatabase,
    pub bootstrap: BootstrapSecret,
    /// `None` disables rate limiting.
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let rate_limiter = state.rate_limiter.clone();

    let router = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/api/v1/origins", post(origins::create_origin))
        .route("/api/v1/origins/list", get(origins::list_origins))
        .route("/api/v1/routes", post(routes::create_route))
        .route("/api/v1/routes/list", get(routes::list_routes))
        .route("/api/v1/edge-nodes/list", get(edge_nodes::list_edge_nodes))
        .route(ENROLL_PATH, post(edge_nodes::register_edge_node))
        .route(CONFIG_PATH, get(edge_nodes::edge_config))
        .fallback(not_found)
        .with_state(state);

    let router = match rate_limiter {
        Some(limiter) => router.layer(from_fn_with_state(limiter, rate_limit::rate_limit)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

async fn not_found() -> ApiError {
    ApiError::NotFound("not found".into())
}
