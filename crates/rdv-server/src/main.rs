//! rendezvous
//!
//! Listener role: accepts TLS callbacks from remote agents and hands each
//! one to a fresh tmux window. Bridge role (`--socket`): runs inside that
//! window and connects the operator's terminal to the agent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rdv_core::config::{self, ListenerConfig};
use rdv_server::rendezvous::ensure_state_dir;
use rdv_server::server::{load_tls_identity, RendezvousServer};
use rdv_server::session::{BridgeCommand, TmuxMultiplexer};
use rdv_server::{bridge, ServerState};

#[derive(Parser)]
#[command(name = "rdv")]
#[command(about = "Reverse-shell rendezvous listener")]
#[command(version)]
struct Args {
    /// Interface address to bind (overrides config)
    #[arg(short = 'i', long)]
    host: Option<String>,

    /// Port to bind (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding server.pem and server.key (overrides config)
    #[arg(short, long)]
    keys: Option<PathBuf>,

    /// Run as a bridge on this rendezvous socket
    #[arg(short, long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for rendezvous sockets (overrides config)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Put the operator terminal in raw mode
    #[arg(long)]
    raw: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout belongs to the terminal in bridge role
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(socket) = &args.socket {
        let code = match bridge::run(socket, args.raw).await {
            Ok(_) => 0,
            Err(e) => {
                tracing::error!("{:#}", e);
                1
            }
        };
        // The stdin reader thread would keep the runtime alive
        std::process::exit(code);
    }

    run_listener(args).await
}

fn load_listener_config(path: Option<&Path>) -> Result<ListenerConfig> {
    if let Some(config_path) = path {
        return config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        config::load_config(&default_path)
            .with_context(|| format!("Failed to load config from {:?}", default_path))
    } else {
        tracing::info!("Using default configuration");
        Ok(ListenerConfig::default())
    }
}

async fn run_listener(args: Args) -> Result<()> {
    tracing::info!("rendezvous listener starting...");

    let mut config = load_listener_config(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(keys) = args.keys {
        config.keys_dir = keys;
    }
    if let Some(state_dir) = args.state_dir {
        config.state_dir = state_dir;
    }
    config.raw_terminal |= args.raw;
    config.validate().context("Invalid configuration")?;

    ensure_state_dir(&config.state_dir)
        .with_context(|| format!("Failed to create state directory {:?}", config.state_dir))?;

    let identity = load_tls_identity(&config.cert_path(), &config.key_path())
        .context("Failed to load TLS key pair")?;
    tracing::info!("Certificate fingerprint: {}", identity.fingerprint);

    let bridge = BridgeCommand::current_exe(config.raw_terminal)
        .context("Failed to resolve own executable path")?;
    let mux = Arc::new(TmuxMultiplexer::new(&config.tmux));
    let bind_addr = config.bind_address();
    let state = Arc::new(ServerState::new(config, mux, bridge));

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone())?;

    let server = RendezvousServer::new(identity.acceptor(), state, cancel);
    server.run(&bind_addr).await?;

    tracing::info!("rendezvous listener stopped");
    Ok(())
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
fn spawn_signal_handler(cancel: CancellationToken) -> Result<()> {
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel.cancel();
    });

    Ok(())
}
