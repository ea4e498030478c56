use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetwatch_core::store::MachineStore;
use fleetwatch_db::PgMachineStore;
use fleetwatch_events::EmailConfig;
use fleetwatch_monitor::notifiers::build_notifier;
use fleetwatch_monitor::{Monitor, MonitorConfig, MonitorScheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetwatch_monitor=info,fleetwatch_events=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = MonitorConfig::from_env();
    tracing::info!(
        offline_after_secs = config.offline_after.as_secs(),
        check_interval_secs = config.check_interval.as_secs(),
        cooldown_secs = config.thresholds.cooldown.as_secs(),
        "Loaded monitor configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = fleetwatch_db::create_pool(&database_url, config.db_max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    let store = Arc::new(PgMachineStore::new(pool));
    store
        .ensure_registry()
        .await
        .context("Failed to provision machine registry")?;
    tracing::info!("Machine registry ready");

    // --- Notifications ---
    let notifier = Arc::new(build_notifier(&config, EmailConfig::from_env()));

    // --- Scheduler ---
    let monitor = Monitor::from_config(store, notifier, &config);
    let scheduler = MonitorScheduler::new(monitor, config.check_interval);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(cancel.clone()));

    shutdown_signal().await;

    cancel.cancel();
    if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
        tracing::warn!("Monitor scheduler did not stop within 5s");
    }
    tracing::info!("Graceful shutdown complete");

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
///
/// If a handler cannot be installed, that signal is ignored and the other
/// still triggers shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
