//! HTTP server for the Prometheus metrics endpoint.
//!
//! Runs on a separate tokio task and serves `/metrics` for scraping,
//! plus `/healthz` for liveness probes.

use axum::{Router, routing::get};
use std::net::SocketAddr;

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Handler for GET /healthz - liveness probe.
async fn healthz_handler() -> &'static str {
    "ok\n"
}

/// Run the HTTP server for Prometheus metrics.
///
/// Binds to `0.0.0.0:port`. This is a long-running task that should be
/// spawned in the background; bind or serve failures are logged, not
/// fatal, since the exchange itself keeps working without metrics.
pub async fn run_http_server(port: u16) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Prometheus HTTP server listening");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind metrics HTTP server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Metrics HTTP server error");
    }
}
