//! Units written to a push channel and their SSE encoding.

use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tether_core::{SessionId, ToolDescriptor};

/// One unit of server→client traffic.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// First frame on every channel: where to POST inbound calls.
    Handshake {
        /// `<message_path>?sessionId=<id>`.
        endpoint: String,
    },
    /// Tool catalog snapshot taken at open time.
    Capabilities {
        /// Available tools.
        tools: Vec<ToolDescriptor>,
    },
    /// Periodic liveness signal.
    Heartbeat {
        /// When the frame was produced.
        at: DateTime<Utc>,
    },
    /// Protocol payload pushed by a message handler.
    Message {
        /// JSON payload.
        payload: Value,
    },
}

impl Frame {
    /// Handshake frame for a session.
    pub fn handshake(message_path: &str, session_id: &SessionId) -> Self {
        Self::Handshake {
            endpoint: format!("{message_path}?sessionId={session_id}"),
        }
    }

    /// Heartbeat stamped with the current time.
    pub fn heartbeat() -> Self {
        Self::Heartbeat { at: Utc::now() }
    }

    /// SSE `event:` name.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Handshake { .. } => "endpoint",
            Self::Capabilities { .. } => "tools",
            Self::Heartbeat { .. } => "ping",
            Self::Message { .. } => "message",
        }
    }

    /// SSE `data:` text.
    pub fn data(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Handshake { endpoint } => Ok(endpoint.clone()),
            Self::Capabilities { tools } => serde_json::to_string(tools),
            Self::Heartbeat { at } => Ok(at.timestamp_millis().to_string()),
            Self::Message { payload } => serde_json::to_string(payload),
        }
    }

    /// Encode as an SSE event.
    pub fn into_event(self) -> Result<Event, serde_json::Error> {
        let data = self.data()?;
        Ok(Event::default().event(self.event_name()).data(data))
    }
}
