use std::net::SocketAddr;

use crate::wire::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "parkfit_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "parkfit_request_duration_seconds";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: placement attempts. Labels: outcome (placed, unplaced).
pub const PLACEMENTS_TOTAL: &str = "parkfit_placements_total";

/// Histogram: idle minutes removed by one defragmentation pass.
pub const DEFRAG_GAP_RECLAIMED_MINUTES: &str = "parkfit_defrag_gap_reclaimed_minutes";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "parkfit_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "parkfit_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "parkfit_connections_rejected_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Request variant to a short label for metrics.
pub fn op_label(request: &Request) -> &'static str {
    match request {
        Request::Reserve { .. } => "reserve",
        Request::Optimize { .. } => "optimize",
        Request::Place { .. } => "place",
        Request::Defragment { .. } => "defragment",
    }
}
