//! Prometheus metrics.
//
//! Status codes are tracked via labels, not separate metric names.

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

pub const REQUESTS_TOTAL: &str = "edgefwd_requests_total";
pub const UPSTREAM_ERRORS_TOTAL: &str = "edgefwd_upstream_errors_total";
pub const WRITE_ERRORS_TOTAL: &str = "edgefwd_write_errors_total";
pub const BYTES_WRITTEN_TOTAL: &str = "edgefwd_bytes_written_total";
pub const UPSTREAM_LATENCY: &str = "edgefwd_upstream_latency_seconds";

/// Installs the global Prometheus recorder, optionally with a scrape listener.
///
/// Must be called before the tokio runtime starts: `install()` spawns its own
/// runtime on a background thread for the listener.
pub fn init_prometheus_exporter(listen: Option<&str>) -> anyhow::Result<()> {
    let mut builder = PrometheusBuilder::new();
    if let Some(addr) = listen {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid metrics listen address {:?}", addr))?;
        builder = builder.with_http_listener(addr);
    }
    builder
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    describe();
    Ok(())
}

/// Registers descriptions for every metric.
pub fn describe() {
    metrics::describe_counter!(
        REQUESTS_TOTAL,
        metrics::Unit::Count,
        "Total number of client responses by status code"
    );
    metrics::describe_counter!(
        UPSTREAM_ERRORS_TOTAL,
        metrics::Unit::Count,
        "Upstream round trips that failed, by kind"
    );
    metrics::describe_counter!(
        WRITE_ERRORS_TOTAL,
        metrics::Unit::Count,
        "Responses that could not be written to the client"
    );
    metrics::describe_counter!(
        BYTES_WRITTEN_TOTAL,
        metrics::Unit::Bytes,
        "Bytes accepted by client sockets"
    );
    metrics::describe_histogram!(
        UPSTREAM_LATENCY,
        metrics::Unit::Seconds,
        "Time from upstream request start to response head"
    );
}

pub fn inc_requests(code: u16) {
    metrics::counter!(REQUESTS_TOTAL, "code" => code.to_string()).increment(1);
}

/// `kind` is `request` or `body_read`.
pub fn inc_upstream_errors(kind: &'static str) {
    metrics::counter!(UPSTREAM_ERRORS_TOTAL, "kind" => kind).increment(1);
}

pub fn inc_write_errors() {
    metrics::counter!(WRITE_ERRORS_TOTAL).increment(1);
}

/// Adds the final byte count of a closed connection.
pub fn add_bytes_written(bytes: u64) {
    metrics::counter!(BYTES_WRITTEN_TOTAL).increment(bytes);
}

pub fn observe_upstream_latency(latency: Duration) {
    metrics::histogram!(UPSTREAM_LATENCY).record(latency.as_secs_f64());
}
