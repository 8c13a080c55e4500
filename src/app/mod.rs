pub mod cli;
mod router;
pub mod server;
pub mod state;
pub mod tracing;

pub use router::router;

use crate::config::{self, Settings};
use crate::error::LabwatchError;
use crate::fanout::Hub;
use crate::merge::{MergeLoop, MergeLoopStats, WatcherOutputs, watcher_channels};
use crate::status::StatusStore;
use crate::watcher::{LokiWatcher, NodeWatcher};
use clap::Parser;
use cli::{Cli, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Application entry point. Parses the CLI, initializes tracing and
/// configuration, starts the watchers and the merge loop, then serves HTTP.
pub async fn run() -> Result<(), LabwatchError> {
    let cli = Cli::parse();

    // Healthcheck subcommand (for container healthchecks)
    if let Some(Command::Healthcheck { port }) = cli.command {
        match crate::healthcheck_with_port(port).await {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("Healthcheck failed: {e}");
                std::process::exit(1)
            }
        }
    }

    tracing::init_tracing(cli.log_level.into());
    ::tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting labwatch");

    let settings = config::get_configuration(cli.config.as_deref())?;
    ::tracing::info!("Loaded settings");

    let shutdown_token = CancellationToken::new();
    let (hub, merge_handle) = start_aggregation(&settings, shutdown_token.clone()).await?;
    ::tracing::info!("Watchers initialized");

    let app = router(state::AppState::new(hub, shutdown_token.clone()));
    server::serve(app, settings.listen_port, shutdown_token).await?;

    if let Err(e) = merge_handle.await {
        ::tracing::error!("Merge loop task failed: {}", e);
    }
    Ok(())
}

/// Construct both watchers, then spawn them alongside the merge loop.
///
/// Construction errors are returned before anything is spawned; the caller
/// treats them as fatal. Everything spawned stops when `shutdown` is cancelled.
pub async fn start_aggregation(
    settings: &Settings,
    shutdown: CancellationToken,
) -> Result<(Hub, JoinHandle<MergeLoopStats>), LabwatchError> {
    let nodes = NodeWatcher::new(settings.node_config())?;
    let loki = LokiWatcher::new(settings.loki_config()).await?;

    let (store, reader) = StatusStore::new();
    let hub = Hub::new(reader);
    let (outputs, inputs) = watcher_channels();
    let WatcherOutputs {
        health,
        stats,
        events,
    } = outputs;

    let token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = nodes.watch(token, health).await {
            ::tracing::error!(error = %e, "Node watcher failed");
        }
    });

    let token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = loki.watch(token, events, stats).await {
            ::tracing::error!(error = %e, "Loki watcher failed");
        }
    });

    let merge_handle = MergeLoop::new(store, hub.clone(), inputs).spawn(shutdown);
    Ok((hub, merge_handle))
}
