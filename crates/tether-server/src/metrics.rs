//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric names.

/// Channels opened total (counter).
pub const SSE_CHANNELS_OPENED_TOTAL: &str = "sse_channels_opened_total";
/// Channels closed total (counter, labels: reason).
pub const SSE_CHANNELS_CLOSED_TOTAL: &str = "sse_channels_closed_total";
/// Open channels (gauge).
pub const SSE_CHANNELS_ACTIVE: &str = "sse_channels_active";
/// Heartbeat frames written total (counter).
pub const SSE_HEARTBEATS_TOTAL: &str = "sse_heartbeats_total";
/// Inbound calls total (counter, labels: outcome).
pub const INBOUND_CALLS_TOTAL: &str = "inbound_calls_total";
/// Inbound call duration seconds (histogram).
pub const INBOUND_CALL_DURATION_SECONDS: &str = "inbound_call_duration_seconds";
