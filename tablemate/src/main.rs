use api::AppState;
use clap::{Parser, Subcommand};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal::ctrl_c;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod config;

#[derive(Parser)]
#[command(version, about = "Tablemate backend")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the HTTP API
    Serve {
        #[arg(long, short, default_value = "tablemate.yaml")]
        config: PathBuf,
    },
    /// Load and validate a config file, then exit
    CheckConfig {
        #[arg(long, short, default_value = "tablemate.yaml")]
        config: PathBuf,
    },
}

#[derive(thiserror::Error, Debug)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not start runtime: {0}")]
    Runtime(std::io::Error),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("could not open store: {0}")]
    Snapshot(#[from] docstore::snapshot::SnapshotError),
    #[error("could not register collections: {0}")]
    Store(#[from] docstore::StoreError),
    #[error("could not seed admin: {0}")]
    Bootstrap(#[from] accounts::AccountError),
    #[error("server error: {0}")]
    Serve(#[from] api::ServeError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Serve { config } => serve(&config),
        CliCommand::CheckConfig { config } => Config::from_file(&config)
            .map(|_| println!("{} is valid", config.display()))
            .map_err(StartupError::from),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn serve(path: &std::path::Path) -> Result<(), StartupError> {
    let config = Config::from_file(path)?;

    // Keeps the sentry client alive until shutdown
    let _sentry = init_logging(&config.logging);
    if let Some(metrics) = &config.metrics {
        init_metrics(metrics)?;
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;
    rt.block_on(run(config))
}

fn init_logging(config: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    let guard = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), StartupError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some("tablemate"))
        .map_err(|e| StartupError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| StartupError::Metrics(e.to_string()))?;

    for defs in [
        docstore::ALL_METRICS,
        ledger::ALL_METRICS,
        accounts::ALL_METRICS,
        api::ALL_METRICS,
    ] {
        shared::metrics_defs::describe_all(defs);
    }
    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "Sending metrics to statsd"
    );
    Ok(())
}

async fn run(config: Config) -> Result<(), StartupError> {
    let config = config.api;
    let (store, persister) = docstore::open(&config.store).await?;

    let state = AppState::new(&store, &config, config.email.sender())?;
    state
        .admins
        .ensure_bootstrap(config.bootstrap_admin.as_ref())
        .await?;

    let served = api::serve(&config.listener, state, shutdown_signal()).await;

    // The final flush runs even when serving failed
    match persister.shutdown().await {
        Ok(bytes) => tracing::info!(bytes, "Store flushed, shutting down"),
        Err(e) => tracing::error!(error = %e, "Final store flush failed"),
    }
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
