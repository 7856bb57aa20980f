//! Tracing and metrics setup.

use std::net::SocketAddr;

use metrics::Unit;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogFormat;
use crate::error::{Result, WorkerError};

/// Installs the global tracing subscriber.
///
/// An invalid filter directive falls back to `info`.
pub fn init_tracing(directive: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
    .map_err(|e| WorkerError::Tracing(e.to_string()))
}

/// Installs the Prometheus recorder with a scrape endpoint on `addr`.
pub fn install_metrics(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!(
        "orders_mutations_total",
        "Order mutations committed by the synchronizer"
    );
    metrics::describe_counter!(
        "orders_downstream_failures_total",
        "Downstream steps that failed or were skipped after a store commit"
    );
    metrics::describe_histogram!(
        "orders_sync_duration_seconds",
        Unit::Seconds,
        "Time spent synchronizing one order mutation"
    );
    metrics::describe_counter!(
        "outbox_relay_delivered_total",
        "Outbox entries propagated by the relay"
    );
    metrics::describe_counter!(
        "outbox_relay_failed_total",
        "Outbox relay delivery attempts that failed"
    );
}
