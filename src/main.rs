//! pbxd - PBX telephone exchange simulation daemon.
//!
//! Clients connect over TCP, get plugged into the switchboard as
//! telephone units, and dial, pick up, hang up, and chat with one
//! another over a line-based text protocol.

mod config;
mod error;
mod http;
mod metrics;
mod network;
mod state;
mod telemetry;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::network::Gateway;
use crate::state::Pbx;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "pbxd.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        listen = %config.server.listen,
        max_extensions = config.server.max_extensions,
        "Starting pbxd"
    );

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        tokio::spawn(async move {
            http::run_http_server(metrics_port).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    let pbx = Arc::new(Pbx::new(config.server.max_extensions));
    let shutdown = CancellationToken::new();

    // SIGHUP or SIGINT stops the accept loop; the switchboard then
    // drains every live session before the process exits.
    spawn_signal_listener(shutdown.clone())?;

    let gateway = Gateway::bind(config.server.listen, Arc::clone(&pbx), shutdown.clone()).await?;
    gateway.run().await?;

    pbx.shutdown().await;
    info!(remaining = pbx.count(), "Switchboard drained, exiting");
    Ok(())
}

fn spawn_signal_listener(shutdown: CancellationToken) -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    // Install the handler before anything can signal us.
    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = hangup.recv() => info!("SIGHUP received"),
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("SIGINT received"),
                Err(e) => {
                    error!(error = %e, "Failed to listen for SIGINT");
                    return;
                }
            },
        }
        shutdown.cancel();
    });
    Ok(())
}
