//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_settings::TetherSettings;

/// Configuration for the HTTP server and its transport.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Path of the push stream route.
    pub stream_path: String,
    /// Path of the inbound call route.
    pub message_path: String,
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Outbound frame buffer per channel.
    pub channel_capacity: usize,
    /// Maximum number of concurrently open channels.
    pub max_sessions: usize,
    /// Max inbound body size in bytes.
    pub max_message_bytes: usize,
    /// Name reported by `/health` and protocol handshakes.
    pub name: String,
    /// Version reported by `/health` and protocol handshakes.
    pub version: String,
    /// Allowed CORS origins (empty for any).
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            stream_path: "/stream".into(),
            message_path: "/messages".into(),
            heartbeat_interval_ms: 30_000,
            channel_capacity: 1024,
            max_sessions: 1024,
            max_message_bytes: 4 * 1024 * 1024,
            name: tether_core::constants::NAME.into(),
            version: tether_core::constants::VERSION.into(),
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &TetherSettings) -> Self {
        let server = &settings.server;
        Self {
            host: server.host.clone(),
            port: server.port,
            stream_path: server.stream_path.clone(),
            message_path: server.message_path.clone(),
            heartbeat_interval_ms: server.heartbeat_interval_ms,
            channel_capacity: server.channel_capacity,
            max_sessions: server.max_sessions,
            max_message_bytes: server.max_message_bytes,
            name: server.name.clone(),
            version: server.version.clone(),
            allowed_origins: settings.cors.allowed_origins.clone(),
        }
    }

    /// Heartbeat interval as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
