//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

use crate::config::ServerConfig;

/// Coarse server status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Accepting channels and calls.
    Ok,
    /// Shutdown has begun; new channels are refused.
    Draining,
}

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok` or `draining`.
    pub status: HealthStatus,
    /// Server name.
    pub server: String,
    /// Server version.
    pub version: String,
    /// Open push channels.
    pub connections: usize,
    /// Seconds since the server started.
    pub uptime_secs: u64,
}

/// Snapshot the server's health.
pub fn health_check(
    start_time: Instant,
    config: &ServerConfig,
    connections: usize,
    draining: bool,
) -> HealthResponse {
    HealthResponse {
        status: if draining {
            HealthStatus::Draining
        } else {
            HealthStatus::Ok
        },
        server: config.name.clone(),
        version: config.version.clone(),
        connections,
        uptime_secs: start_time.elapsed().as_secs(),
    }
}
