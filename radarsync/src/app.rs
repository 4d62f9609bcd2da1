use std::sync::Arc;

use anyhow::Context;
use radarsync_config::ConfigLoader;
use radarsync_core::{
    AcquisitionController, CommandRenderer, FileStatusSink, HttpRemoteSource,
    PassSummary, RemoteSource, Renderer, StatusLog, SyncError,
    TracingStatusSink,
};
use tracing::{info, warn};

use crate::cli::Cli;

/// Load configuration, run one pass, and publish the status log.
pub async fn run(cli: Cli) -> anyhow::Result<PassSummary> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path.clone());
    }
    if let Some(path) = &cli.env_file {
        loader = loader.with_env_file(path.clone());
    }
    let load = loader.load().context("failed to load configuration")?;
    for warning in &load.warnings.items {
        match &warning.hint {
            Some(hint) => warn!(
                message = %warning.message,
                hint = %hint,
                "configuration warning"
            ),
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    let mut config = load.config;
    cli.apply(&mut config);
    config
        .ensure_directories()
        .context("failed to prepare working directories")?;

    let remote = HttpRemoteSource::from_config(&config.source)
        .context("invalid remote source")?
        .map(|source| Arc::new(source) as Arc<dyn RemoteSource>);
    let renderer = CommandRenderer::from_config(&config.renderer)
        .map(|renderer| Arc::new(renderer) as Arc<dyn Renderer>);
    if renderer.is_none() {
        warn!("no renderer configured; new scans will stay staged");
    }

    let status = Arc::new(StatusLog::new());
    let mut controller = AcquisitionController::from_config(
        &config,
        remote,
        renderer,
        status.clone(),
    );
    let options = controller.options_mut();
    options.scan_time = cli.scan_time;
    options.skip_georeferenced = cli.skip_georeferenced;

    let outcome = match config.pipeline.pass_timeout {
        Some(limit) => tokio::time::timeout(limit, controller.run_once())
            .await
            .unwrap_or_else(|_| {
                Err(SyncError::Internal(format!(
                    "pass exceeded {}",
                    humantime::format_duration(limit)
                )))
            }),
        None => controller.run_once().await,
    };
    if let Err(err) = &outcome {
        status.error(format!("pass aborted: {err}"));
    }

    status.flush(&TracingStatusSink).await?;
    if let Some(path) = &config.status.status_file {
        status
            .flush(&FileStatusSink::new(path))
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let summary = outcome.context("synchronization pass failed")?;
    info!(
        listed = summary.listed,
        staged = summary.staged,
        rendered = summary.rendered,
        "pass complete"
    );
    Ok(summary)
}
