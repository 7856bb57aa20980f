//! Outbox relay worker entry point.

use order_sync_worker::{WorkerConfig, WorkerError, telemetry};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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

#[tokio::main]
async fn main() -> Result<(), WorkerError> {
    // 1. Load configuration and initialize tracing
    let config = WorkerConfig::from_env();
    telemetry::init_tracing(&config.log_level, config.log_format)?;

    // 2. Install Prometheus metrics exporter
    telemetry::install_metrics(config.metrics_addr)?;

    // 3. Cancel the relay on SIGINT / SIGTERM
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    // 4. Run the relay
    tracing::info!(
        index = %config.orders_index,
        search = %config.elasticsearch_node,
        "starting outbox relay worker"
    );
    order_sync_worker::run(config, shutdown).await?;

    tracing::info!("worker shut down gracefully");
    Ok(())
}
