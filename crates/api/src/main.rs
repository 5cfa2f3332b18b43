//! API server entry point.

use std::error::Error;

use api::config::{Config, LogFormat};
use event_store::{EventStore, SqliteEventStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);
    tracing::info!("server is starting up");

    // 2. Install Prometheus metrics recorder
    let metrics_handle = api::routes::metrics::install_recorder()?;

    // 3. Open the store and make sure the schema exists; nothing is served without it
    let store = SqliteEventStore::connect(config.store_config())
        .await
        .inspect_err(|err| tracing::error!(error = %err, "failed to open database"))?;

    tracing::info!("migrating database");
    store
        .ensure_schema()
        .await
        .inspect_err(|err| tracing::error!(error = %err, "migration failed"))?;
    tracing::info!("migration complete");

    // 4. Start the aggregation worker and build the application
    let (state, worker) = api::create_state(store.clone());
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6. The router (and its trigger) is gone; let the last aggregation finish
    match tokio::time::timeout(config.shutdown_timeout, worker).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(error = %err, "aggregation worker panicked"),
        Err(_) => tracing::warn!(
            timeout = ?config.shutdown_timeout,
            "aggregation worker did not stop in time"
        ),
    }

    store.close().await;
    tracing::info!("server shut down gracefully");
    Ok(())
}
