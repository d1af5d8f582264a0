//! cablink-client binary entry point.
//!
//! Connects to the cabinet manager, logs what it is told, and runs the host
//! tick loop until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! cablink-client [OPTIONS]
//!
//! Options:
//!   --config  <PATH>  TOML config file [default: cablink.toml]
//!   --manager <ADDR>  Override connection.manager_address
//!   --ticks   <N>     Stop after N host ticks
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cablink_client::infrastructure::config::load_config;
use cablink_client::infrastructure::network::TcpTransport;
use cablink_client::transport::Transport;
use cablink_client::CabinetClient;
use cablink_core::protocol::ButtonPanelEvent;
use cablink_core::CategoryDescriptor;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Cabinet link client.
#[derive(Debug, Parser)]
#[command(name = "cablink-client", about = "Client for the cabinet manager link", version)]
struct Cli {
    /// Path of the TOML config file.  Missing files mean defaults.
    #[arg(long, default_value = "cablink.toml", env = "CABLINK_CONFIG")]
    config: PathBuf,

    /// Manager address (`ip:port`), overriding the config file.
    #[arg(long, env = "CABLINK_MANAGER")]
    manager: Option<String>,

    /// Stop after this many host ticks instead of waiting for Ctrl-C.
    #[arg(long)]
    ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(manager) = cli.manager {
        config.connection.manager_address = manager;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level)),
        )
        .init();

    info!("cablink client starting");

    let addr = config.manager_addr().context("invalid manager address")?;
    let timeout = config.connect_timeout();
    let client = Arc::new(CabinetClient::new(config.to_options()));

    client.on_category_installed(|descriptor: &CategoryDescriptor| {
        info!("category available: {descriptor}");
    });
    client.button_panel().events().subscribe(|event: &ButtonPanelEvent| {
        info!("button event: {event:?}");
    });

    // The handshake blocks on its response, so keep it off the runtime.
    let connecting = Arc::clone(&client);
    tokio::task::spawn_blocking(move || {
        connecting.connect_with(|sink| {
            TcpTransport::connect(addr, sink, timeout).map(|t| t as Arc<dyn Transport>)
        })
    })
    .await
    .context("connect task panicked")?
    .with_context(|| format!("connecting to manager at {addr}"))?;

    info!("connected to {addr}");

    // ── Host tick loop ────────────────────────────────────────────────────────
    let mut interval = tokio::time::interval(config.tick_interval());
    let mut ticks: u64 = 0;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            _ = interval.tick() => {
                let ticker = Arc::clone(&client);
                tokio::task::spawn_blocking(move || ticker.update())
                    .await
                    .context("tick task panicked")?;

                if let Some(fault) = client.fault() {
                    warn!("link lost: {fault}");
                    break;
                }
                ticks += 1;
                if cli.ticks.is_some_and(|limit| ticks >= limit) {
                    info!("tick limit reached");
                    break;
                }
            }
        }
    }

    if client.pending_events() > 0 {
        info!("{} host events left undrained", client.pending_events());
    }
    let disconnecting = Arc::clone(&client);
    tokio::task::spawn_blocking(move || disconnecting.disconnect())
        .await
        .context("disconnect task panicked")?;

    info!("cablink client stopped");
    Ok(())
}
