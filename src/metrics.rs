use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter's own HTTP listener on `addr` (serves `/metrics`).
///
/// Needs a running Tokio runtime. Metric descriptions are registered on first use
/// by the feed modules, so series appear as soon as the first event is handled.
pub fn install_exporter(addr: &str) -> Result<SocketAddr> {
    let sock: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid metrics_addr '{addr}'"))?;

    PrometheusBuilder::new()
        .with_http_listener(sock)
        .install()
        .context("prometheus: install exporter")?;

    tracing::info!(%sock, "metrics exporter listening");
    Ok(sock)
}
