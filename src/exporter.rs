//! HTTP endpoint serving the registry in the Prometheus text format.
//!
//! The modem only answers a handful of paths, so neither do we: `/metrics`
//! and `/` serve the same thing.

use crate::error::Result;
use crate::metrics::PrometheusRegistry;
use anyhow::Context;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub struct EncodingFailed;

impl IntoResponse for EncodingFailed {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
    }
}

pub async fn metrics_handler(
    State(registry): State<Arc<PrometheusRegistry>>,
) -> Result<impl IntoResponse, EncodingFailed> {
    match registry.encode() {
        Ok(body) => Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], body)),
        Err(e) => {
            tracing::error!(error = ?e, "Failed to encode metrics");
            Err(EncodingFailed)
        }
    }
}

pub fn router(registry: Arc<PrometheusRegistry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/", get(metrics_handler))
        .with_state(registry)
}

pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {}", addr))?;
    Ok(listener)
}

/// Serves until the task is dropped.
pub async fn serve(listener: TcpListener, registry: Arc<PrometheusRegistry>) -> Result<()> {
    let addr = listener.local_addr().context("Metrics listener has no address")?;
    tracing::info!(%addr, "Metrics server started");
    axum::serve(listener, router(registry))
        .await
        .context("Metrics server failed")?;
    Ok(())
}
