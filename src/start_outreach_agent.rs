//! Startup helpers for the outreach binaries.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::pipeline::{PipelineBackends, run_pipeline};
use crate::progress::{RunSummary, TracingReporter};
use crate::server::{self, AppState};

/// Install the tracing subscriber (`RUST_LOG` overrides the `info` default).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}

/// Run the pipeline once (used by the `outreach` binary).
///
/// Ctrl-C cancels the run between chunks.
///
/// # Returns
/// `ExitCode::SUCCESS` when every chunk was processed, `1` otherwise.
#[must_use]
pub fn run_once() -> ExitCode {
    init_tracing();
    tracing::info!("Starting outreach pipeline v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match rt.block_on(pipeline_once()) {
        Ok(summary) if summary.cancelled => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Pipeline error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn pipeline_once() -> anyhow::Result<RunSummary> {
    let config = PipelineConfig::from_env().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    let backends = PipelineBackends::connect(&config)
        .await
        .context("connecting backends")?;
    let summary = run_pipeline(&config, backends, Arc::new(TracingReporter), cancel).await?;
    Ok(summary)
}

/// Run the control server (used by the `outreach-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();
    tracing::info!("Starting outreach control server v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve()) {
        tracing::error!("Server error: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

async fn serve() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    let port = config.server.port;
    let state = AppState::new(config);
    let shutdown_state = Arc::clone(&state);
    let shutdown = async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
        }
        shutdown_state.controller.terminate().await;
    };

    server::run_server_with_shutdown(state, port, shutdown)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}
