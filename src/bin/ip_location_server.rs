//! HTTP server entry point.
//!
//! Loads configuration and the CSV dataset, then serves lookups until
//! Ctrl-C or SIGTERM. On unix, SIGHUP reloads the dataset from the same path
//! without dropping requests.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ip_geo_lookup::config::{self, Config};
use ip_geo_lookup::{LookupService, http, loader};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_path = config::load_dotenv();
    let config = Config::load().context("failed to load configuration")?;

    init_tracing(config.log_level.as_deref());
    match dotenv_path {
        Some(path) => info!(path = %path.display(), "loaded environment file"),
        None => info!(".env file not found, using environment and defaults"),
    }

    if let Some(url) = config.dataset_url.clone() {
        refresh_dataset(url, config.csv_file_path.clone()).await?;
    }

    let options = config.load_options();
    let path = config.csv_file_path.clone();
    let (index, _) = tokio::task::spawn_blocking(move || loader::load_csv(&path, &options))
        .await
        .context("dataset load task failed")?
        .with_context(|| format!("failed to load dataset {}", config.csv_file_path.display()))?;

    let stats = index.stats();
    info!(
        ranges = stats.total_ranges,
        addresses = stats.total_addresses,
        countries = stats.countries,
        policy = %config.overlap_policy,
        "range index ready"
    );

    let service = Arc::new(LookupService::new(index));

    #[cfg(unix)]
    spawn_reload_on_hangup(Arc::clone(&service), config.clone());

    let listener = TcpListener::bind(&config.http_server_address)
        .await
        .with_context(|| format!("failed to bind {}", config.http_server_address))?;

    info!(version = env!("CARGO_PKG_VERSION"), "server starting");
    http::serve(listener, service, shutdown_signal())
        .await
        .context("server failed")?;

    info!("server stopped");
    Ok(())
}

#[cfg(feature = "download")]
async fn refresh_dataset(url: String, path: std::path::PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || loader::update_cache_from_url(&path, &url))
        .await
        .context("dataset download task failed")?
        .context("failed to download dataset")?;
    Ok(())
}

#[cfg(not(feature = "download"))]
async fn refresh_dataset(url: String, path: std::path::PathBuf) -> Result<()> {
    warn!(
        url = %url,
        path = %path.display(),
        "DATASET_URL is set but the download feature is disabled, using existing file"
    );
    Ok(())
}

fn init_tracing(log_level: Option<&str>) {
    let env_filter = log_level
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    if tracing_subscriber::fmt().with_env_filter(env_filter).try_init().is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }
}

#[cfg(unix)]
fn spawn_reload_on_hangup(service: Arc<LookupService>, config: Config) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "SIGHUP reload disabled");
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!(path = %config.csv_file_path.display(), "SIGHUP received, reloading dataset");

            let service = Arc::clone(&service);
            let path = config.csv_file_path.clone();
            let options = config.load_options();
            let outcome =
                tokio::task::spawn_blocking(move || service.reload_from_csv(&path, &options)).await;

            match outcome {
                Ok(Ok(report)) => info!(
                    rows = report.rows_read,
                    skipped = report.rows_skipped,
                    "dataset reloaded"
                ),
                Ok(Err(err)) => warn!(error = %err, "reload failed, keeping current index"),
                Err(err) => warn!(error = %err, "reload task failed, keeping current index"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
