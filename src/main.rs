use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use facility_core::{RetentionScheduler, StorageConfig};

/// Main entry point for the facility storage process
///
/// Resolves storage configuration once, then runs the photo retention scheduler until Ctrl-C.
/// Upload handlers live in the HTTP service and receive a `StorageService` built from the same
/// configuration.
///
/// # Environment Variables
/// - `STORAGE_ROOT`: Base directory for stored files (default: "uploads_dev")
/// - `RETENTION_DAYS`: Days before a photo becomes eligible for deletion (default: 60)
/// - `PUBLIC_BASE_URL`: Absolute base URL for stored files (default: unset, root-relative URLs)
/// - `MAX_FILE_MB`: Maximum accepted upload size (default: 20)
/// - `SWEEP_INTERVAL_SECS`: Seconds between retention sweeps (default: 86400)
///
/// # Returns
/// * `Ok(())` - If the scheduler ran and shut down cleanly
/// * `Err(anyhow::Error)` - If configuration is invalid or the scheduler task failed
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("facility_run=info".parse()?)
                .add_directive("facility_core=info".parse()?)
                .add_directive("facility_files=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StorageConfig::from_env()?;

    tracing::info!(
        "++ Storage root {} (photos kept {} days, max upload {} MB)",
        config.storage_root().display(),
        config.retention_days(),
        config.max_file_mb()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(RetentionScheduler::from_config(&config).run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("-- Shutdown requested");
    shutdown_tx.send(true).ok();

    let sweeps = scheduler.await?;
    tracing::info!("-- Stopped after {} sweep(s)", sweeps);

    Ok(())
}
