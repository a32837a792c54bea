//! Kokoa Control Plane
//!
//! Stores routing intent and serves rendered proxy configuration to
//! polling edge agents.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use kokoa_core::tracing_init::init_tracing;
use kokoa_cp::auth::BootstrapSecret;
use kokoa_cp::http::{AppState, RateLimitConfig, RateLimiter, build_router};
use kokoa_cp::storage::ControlPlaneDatabase;

#[derive(Parser, Debug)]
#[command(name = "kokoa-cp")]
#[command(version, about = "Kokoa control plane - route store and edge config server")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080", env = "CP_LISTEN_ADDR")]
    addr: SocketAddr,

    /// Path to SQLite database file.
    #[arg(long, default_value = "data/kokoa.db", env = "CP_DB_PATH")]
    db_path: PathBuf,

    /// Shared secret for edge node enrollment. Enrollment is disabled when empty.
    #[arg(long, default_value = "", env = "CP_BOOTSTRAP_TOKEN", hide_env_values = true)]
    bootstrap_token: String,

    /// Requests allowed per source address per window (0 disables limiting).
    #[arg(long, default_value_t = 60, env = "CP_RATE_LIMIT")]
    rate_limit: u32,

    /// Rate limit window in seconds.
    #[arg(long, default_value_t = 60, env = "CP_RATE_WINDOW_SECS")]
    rate_window_secs: u64,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "CP_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("kokoa_cp=info,tower_http=info", args.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        "Starting kokoa-cp"
    );

    info!(path = %args.db_path.display(), "Opening control plane database");
    let db = ControlPlaneDatabase::open(&args.db_path).await?;

    let bootstrap = BootstrapSecret::new(&args.bootstrap_token);
    if !bootstrap.is_configured() {
        warn!("CP_BOOTSTRAP_TOKEN is not set; edge node enrollment is disabled");
    }

    let rate_limiter = (args.rate_limit > 0).then(|| {
        Arc::new(RateLimiter::new(RateLimitConfig {
            max_requests: args.rate_limit,
            window: Duration::from_secs(args.rate_window_secs),
            ..Default::default()
        }))
    });
    match &rate_limiter {
        Some(limiter) => info!(
            max_requests = limiter.config().max_requests,
            window_secs = limiter.config().window.as_secs(),
            "Rate limiting enabled"
        ),
        None => warn!("Rate limiting disabled"),
    }

    let app = build_router(AppState {
        db: db.clone(),
        bootstrap,
        rate_limiter,
    });

    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!(addr = %args.addr, "Control plane listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    db.pool().close().await;
    info!("Control plane stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
