use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: availability computations. Labels: outcome.
pub const AVAILABILITY_QUERIES_TOTAL: &str = "slotwise_availability_queries_total";

/// Histogram: end-to-end availability latency in seconds (fetch + compute).
pub const AVAILABILITY_DURATION_SECONDS: &str = "slotwise_availability_duration_seconds";

/// Counter: queries refused because an input could not be fetched. Labels: source.
pub const DATA_UNAVAILABLE_TOTAL: &str = "slotwise_data_unavailable_total";

/// Counter: blockade mutations. Labels: op, status.
pub const BLOCKADE_MUTATIONS_TOTAL: &str = "slotwise_blockade_mutations_total";

// ── Engine / storage ────────────────────────────────────────────

/// Counter: recurring-blockade lookups cut off by the iteration cap.
pub const RECURRENCE_CEILING_TOTAL: &str = "slotwise_recurrence_ceiling_total";

/// Counter: events durably appended to the WAL.
pub const WAL_APPENDS_TOTAL: &str = "slotwise_wal_appends_total";

/// Install the fmt subscriber, honouring `RUST_LOG` and defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init_metrics(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
