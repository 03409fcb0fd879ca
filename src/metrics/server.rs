//! Prometheus metrics endpoint.
//!
//! A run is short-lived, so the endpoint only lives as long as the process:
//! scrape `/metrics` while the job runs, or push from a sidecar.

use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, error};

use crate::error::{MetricsError, PrometheusInitSnafu};

/// Install the Prometheus recorder and serve it on `addr` in the background.
pub fn init(addr: SocketAddr) -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    let app = router(handle.clone());
    tokio::spawn(async move {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                debug!("Metrics endpoint listening on http://{}/metrics", addr);
                if let Err(e) = axum::serve(listener, app).await {
                    error!("Metrics server error: {}", e);
                }
            }
            Err(e) => error!("Failed to bind metrics server to {}: {}", addr, e),
        }
    });

    Ok(handle)
}

fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route(
            "/metrics",
            get(|Extension(handle): Extension<PrometheusHandle>| async move { handle.render() }),
        )
        .route(
            "/health",
            get(|| async { concat!("ok ", env!("CARGO_PKG_VERSION"), "\n") }),
        )
        .layer(Extension(handle))
}
