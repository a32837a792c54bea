//! Kokoa Edge Agent
//!
//! Enrolls an edge host with the control plane and keeps its nginx routing
//! map in sync.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use kokoa_agent::config::{AgentConfig, BackoffPolicy, DEFAULT_MAP_PATH, default_hash_path};
use kokoa_agent::state::write_secret_file;
use kokoa_agent::{ControlPlaneClient, LocalState, NginxController, Poller};
use kokoa_core::tracing_init::init_tracing;

/// Kokoa edge agent.
#[derive(Debug, Parser)]
#[command(name = "kokoa-agent", version, about)]
struct Cli {
    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true, env = "KOKOA_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll the control plane and apply routing changes
    Run(RunArgs),
    /// Enroll this host and obtain a node token
    Enroll(EnrollArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Control plane base URL.
    #[arg(long, env = "KOKOA_CONTROL_PLANE")]
    control_plane: String,

    /// Node token issued at enrollment.
    #[arg(long, env = "KOKOA_NODE_TOKEN", hide_env_values = true, conflicts_with = "token_file")]
    token: Option<String>,

    /// File containing the node token.
    #[arg(long, env = "KOKOA_NODE_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Where the applied nginx map is written.
    #[arg(long, default_value = DEFAULT_MAP_PATH)]
    map_path: PathBuf,

    /// Fingerprint file (default: `<map-path>.sha256`).
    #[arg(long)]
    hash_path: Option<PathBuf>,

    /// nginx binary used for syntax checks and reloads.
    #[arg(long, default_value = "nginx")]
    nginx_bin: PathBuf,

    /// Seconds between polls.
    #[arg(long, default_value_t = 10)]
    poll_interval_secs: u64,

    /// HTTP request timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Initial backoff after a failed poll, in seconds.
    #[arg(long, default_value_t = 2)]
    backoff_initial_secs: u64,

    /// Maximum backoff between failed polls, in seconds.
    #[arg(long, default_value_t = 60)]
    backoff_max_secs: u64,
}

#[derive(Debug, Args)]
struct EnrollArgs {
    /// Control plane base URL.
    #[arg(long, env = "KOKOA_CONTROL_PLANE")]
    control_plane: String,

    /// Shared enrollment secret configured on the control plane.
    #[arg(long, env = "KOKOA_BOOTSTRAP_TOKEN", hide_env_values = true)]
    bootstrap_token: String,

    /// Human-readable name for this edge node.
    #[arg(long)]
    name: Option<String>,

    /// Write the issued token here (mode 0600) instead of printing it.
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// HTTP request timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("kokoa_agent=info", cli.log_json);

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Enroll(args) => enroll(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let token = resolve_token(args.token, args.token_file.as_deref())?;

    let config = AgentConfig {
        control_plane: args.control_plane,
        hash_path: args
            .hash_path
            .unwrap_or_else(|| default_hash_path(&args.map_path)),
        map_path: args.map_path,
        nginx_bin: args.nginx_bin,
        poll_interval: Duration::from_secs(args.poll_interval_secs),
        request_timeout: Duration::from_secs(args.timeout_secs),
        backoff: BackoffPolicy {
            initial_delay: Duration::from_secs(args.backoff_initial_secs),
            max_delay: Duration::from_secs(args.backoff_max_secs),
            ..Default::default()
        },
    };
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        control_plane = %config.control_plane,
        map = %config.map_path.display(),
        "Starting kokoa-agent"
    );

    let client =
        ControlPlaneClient::new(&config.control_plane, config.request_timeout)?.with_node_token(token);
    let mut poller = Poller::new(
        client,
        NginxController::new(config.nginx_bin.clone()),
        LocalState::new(config.map_path.clone(), config.hash_path.clone()),
        config.poll_interval,
        config.backoff.clone(),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });

    poller.run(shutdown_rx).await;
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn enroll(args: EnrollArgs) -> Result<()> {
    let client = ControlPlaneClient::new(&args.control_plane, Duration::from_secs(args.timeout_secs))?;
    let response = client
        .enroll(&args.bootstrap_token, args.name.as_deref())
        .await
        .context("enrollment failed")?;

    info!(edge_node_id = %response.edge_node_id, "Enrolled edge node");

    match args.token_file {
        Some(path) => {
            write_secret_file(&path, &format!("{}\n", response.token))
                .with_context(|| format!("failed to write token to {}", path.display()))?;
            println!("Edge node {} enrolled.", response.edge_node_id);
            println!("Token written to {}", path.display());
        }
        None => {
            println!("Edge node {} enrolled.", response.edge_node_id);
            println!("Token (shown once, store it securely):");
            println!("{}", response.token);
        }
    }
    Ok(())
}

fn resolve_token(token: Option<String>, token_file: Option<&std::path::Path>) -> Result<String> {
    let token = match (token, token_file) {
        (Some(token), _) => token,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read token file {}", path.display()))?,
        (None, None) => bail!("a node token is required (--token or --token-file)"),
    };
    let token = token.trim().to_string();
    if token.is_empty() {
        bail!("node token is empty");
    }
    Ok(token)
}
