//! Arris SB8200 Prometheus Exporter
//!
//! This application scrapes the status pages of an Arris SB8200 cable modem
//! and exposes what it finds as Prometheus metrics.
//!
//! # Architecture
//!
//! Two tasks share one metric registry:
//! - **Poller**: logs in to the modem, fetches the connection status and
//!   product info pages every poll interval and projects them into metrics
//! - **Exporter**: serves the registry on `/metrics` and `/`
//!
//! # Features
//!
//! - Re-login when the modem drops the session
//! - Retry on the next poll when the modem is unavailable
//! - Stops when the modem rejects the credentials
//! - Graceful shutdown on SIGTERM/SIGINT

mod config;
mod error;
mod exporter;
mod metrics;
mod modem;
mod poller;

#[cfg(test)]
mod test_utils;

use crate::error::Result;
use crate::metrics::PrometheusRegistry;
use crate::poller::state::PollTiming;
use crate::poller::Poller;
use anyhow::{anyhow, Context};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal::ctrl_c;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinError;

/// Application entry point.
///
/// Initializes logging, runs until a signal or a fatal error, and maps the
/// outcome onto the exit code.
#[tokio::main]
async fn main() -> ExitCode {
    let log_level = match config::load_app_config() {
        Ok(app_config) => app_config.log_level(),
        Err(_) => tracing::Level::INFO,
    };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, kind = ?e.kind(), "Exporter stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let modem_config = config::load_modem_config()?;
    let exporter_config = config::load_exporter_config()?;
    tracing::info!(
        base_url = %modem_config.base_url,
        username = %modem_config.username,
        "Starting up"
    );

    let registry = Arc::new(PrometheusRegistry::new()?);
    let client = modem::Client::new(&modem_config, registry.clone())?;
    let mut poller = Poller::new(
        client,
        registry.clone(),
        PollTiming::from(&exporter_config),
    );

    let listener = exporter::bind(exporter_config.port).await?;
    let mut server = tokio::spawn(exporter::serve(listener, registry));

    let mut sig_term =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    tracing::info!("Running... Press Ctrl-C or send SIGTERM to terminate.");

    let result = tokio::select! {
        // Handle SIGTERM for graceful shutdown in containers
        _ = sig_term.recv() => {
            tracing::info!("Received SIGTERM. Exiting...");
            Ok(())
        }
        // Handle Ctrl-C for manual termination
        _ = ctrl_c() => {
            tracing::info!("Received SIGINT. Exiting...");
            Ok(())
        }
        // Only returns once the modem rejects the credentials
        result = poller.run() => result,
        result = &mut server => handle_server_exit(result),
    };

    server.abort();
    result
}

/// The metrics server is expected to run forever, so any exit is an error.
fn handle_server_exit(result: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match result {
        Ok(Ok(())) => Err(anyhow!("Metrics server exited").into()),
        Ok(Err(e)) => Err(e),
        Err(e) => Err(anyhow::Error::new(e)
            .context("Metrics server task failed")
            .into()),
    }
}
