//! Server network and transport settings.

use serde::{Deserialize, Serialize};
use tether_core::constants::{DEFAULT_PORT, NAME, VERSION};

use crate::errors::{Result, SettingsError};

/// Server network and transport settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Path of the long-lived push stream.
    pub stream_path: String,
    /// Path that accepts inbound calls.
    pub message_path: String,
    /// Interval between heartbeat frames in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Outbound frame buffer per channel.
    pub channel_capacity: usize,
    /// Maximum number of concurrently open channels.
    pub max_sessions: usize,
    /// Maximum accepted inbound body size in bytes.
    pub max_message_bytes: usize,
    /// Server name reported by health and protocol handshakes.
    pub name: String,
    /// Server version reported by health and protocol handshakes.
    pub version: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            stream_path: "/stream".to_string(),
            message_path: "/messages".to_string(),
            heartbeat_interval_ms: 30_000,
            channel_capacity: 1024,
            max_sessions: 1024,
            max_message_bytes: 4 * 1024 * 1024,
            name: NAME.to_string(),
            version: VERSION.to_string(),
        }
    }
}

impl ServerSettings {
    /// Reject values the transport cannot run with.
    pub fn validate(&self) -> Result<()> {
        check_route("streamPath", &self.stream_path)?;
        check_route("messagePath", &self.message_path)?;
        if self.stream_path == self.message_path {
            return Err(SettingsError::invalid(
                "messagePath",
                "must differ from streamPath",
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(SettingsError::invalid("heartbeatIntervalMs", "must be positive"));
        }
        if self.channel_capacity == 0 {
            return Err(SettingsError::invalid("channelCapacity", "must be positive"));
        }
        if self.max_sessions == 0 {
            return Err(SettingsError::invalid("maxSessions", "must be positive"));
        }
        Ok(())
    }
}

/// Paths the server always routes on its own.
pub const RESERVED_PATHS: [&str; 3] = ["/", "/health", "/metrics"];

/// A configurable route must be a literal absolute path the router can
/// register next to [`RESERVED_PATHS`].
fn check_route(field: &'static str, path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(SettingsError::invalid(
            field,
            format!("must start with '/': {path}"),
        ));
    }
    if RESERVED_PATHS.contains(&path) {
        return Err(SettingsError::invalid(field, format!("{path} is reserved")));
    }
    if let Some(c) = path.chars().find(|&c| matches!(c, '{' | '}' | '*' | '?' | '#')) {
        return Err(SettingsError::invalid(
            field,
            format!("'{c}' is not allowed in a route: {path}"),
        ));
    }
    if path.split('/').any(|segment| segment.starts_with(':')) {
        return Err(SettingsError::invalid(
            field,
            format!("segments may not start with ':': {path}"),
        ));
    }
    Ok(())
}
