use crate::collector::{build_collector, BuildError};
use crate::config::parse::{load_collectors, load_config, ConfigError};
use crate::config::types::{StateStoreConfig, StateStoreType};
use crate::invoker::Invoker;
use crate::service::{Service, ServiceError};
use crate::storage::{DuckDbStore, MemoryStore, StorageError, Storer};
use crate::telemetry::{MetricsRecorder, PrometheusRecorder, TelemetryError};
use crate::web::{run_server, AppState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("collector error: {0}")]
    Build(#[from] BuildError),

    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("web server error: {0}")]
    WebServer(#[from] std::io::Error),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/collectord/config.yml");
            eprintln!("  /etc/collectord/config.yml");
            eprintln!(
                "\nUse --config <path> to specify a config file, \
                 or run 'collectord config init' to generate one."
            );
            std::process::exit(1);
        }
    };

    run_daemon(&config_path).await.map_err(|e| e.into())
}

/// Opens the shared state store described by the config.
pub async fn open_store(config: &StateStoreConfig) -> Result<Arc<dyn Storer>, RunError> {
    match (config.store_type, &config.path) {
        (StateStoreType::Memory, _) => {
            warn!("Using the in-memory state store; watermarks will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        (StateStoreType::Duckdb, Some(path)) => {
            info!(path = %path.display(), "Opening state store");
            Ok(Arc::new(DuckDbStore::open(path).await?))
        }
        (StateStoreType::Duckdb, None) => Err(ConfigError::Validation(
            "state_store: duckdb requires 'path'".to_string(),
        )
        .into()),
    }
}

async fn run_daemon(config_path: &Path) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    info!(path = %config.collectors.path.display(), "Loading collectors");
    let collectors = load_collectors(&config.collectors.path)?;

    let storer = open_store(&config.state_store).await?;
    let recorder = Arc::new(PrometheusRecorder::new()?);

    let mut invokers = Vec::with_capacity(collectors.len());
    for collector_config in &collectors {
        let collector = build_collector(collector_config, storer.clone())?;
        info!(
            collector = %collector_config.name,
            strategy = %collector_config.invocation.strategy,
            source = collector_config.source.source_type(),
            sinks = collector_config.sinks.len(),
            "Collector configured"
        );
        invokers.push(Invoker::new(Box::new(collector)).with_recorder(recorder.clone()));
    }

    let mut service = Service::new(invokers, storer.clone())?;
    let cancel = CancellationToken::new();

    let web_handle = config.web.clone().map(|web_config| {
        info!("Starting web server on {}", web_config.listen);
        let state = Arc::new(AppState {
            storer: storer.clone(),
            recorder: recorder.clone() as Arc<dyn MetricsRecorder>,
        });
        let shutdown = cancel.clone();
        tokio::spawn(async move { run_server(state, web_config, shutdown).await })
    });

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal_cancel.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    info!(collectors = collectors.len(), "Daemon started, press Ctrl+C to shutdown");
    let result = service.run(cancel.clone()).await;
    cancel.cancel();

    let mut web_result = Ok(());
    if let Some(handle) = web_handle {
        match handle.await {
            Ok(Ok(())) => info!("Web server stopped"),
            Ok(Err(e)) => {
                error!(error = %e, "Web server error");
                web_result = Err(RunError::WebServer(e));
            }
            Err(e) => error!(error = %e, "Web server task join error"),
        }
    }

    result?;
    web_result?;
    info!("Daemon shutdown complete");
    Ok(())
}
