//! Session-multiplexed duplex transport.
//!
//! A client opens a long-lived push channel and receives a handshake frame
//! naming the endpoint for its inbound calls. Inbound calls carry the session
//! id, are routed to the open channel, and are acknowledged separately from
//! whatever the handler writes to the channel.
//!
//! - [`channel`]: one push channel and its reading end
//! - [`registry`]: table of open channels
//! - [`heartbeat`]: periodic liveness frames
//! - [`dispatcher`]: inbound call validation and routing
//! - [`responder`]: per-call acknowledgment vs. channel writes

pub mod channel;
pub mod dispatcher;
pub mod frame;
pub mod handler;
pub mod heartbeat;
pub mod registry;
pub mod responder;

use std::sync::Arc;
use std::time::Duration;

use tether_core::ToolCatalog;

pub use channel::{Channel, CloseReason, FrameStream, SessionState};
pub use dispatcher::Dispatcher;
pub use frame::Frame;
pub use handler::{HandlerError, MessageHandler};
pub use registry::SessionRegistry;
pub use responder::{Acknowledgment, Responder};

use crate::config::ServerConfig;
use crate::errors::TransportError;

/// Per-channel settings.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Path advertised in the handshake frame.
    pub message_path: String,
    /// Interval between heartbeat frames.
    pub heartbeat_interval: Duration,
    /// Outbound frame buffer per channel.
    pub channel_capacity: usize,
    /// Maximum number of concurrently open channels.
    pub max_sessions: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            message_path: "/messages".into(),
            heartbeat_interval: Duration::from_secs(30),
            channel_capacity: 1024,
            max_sessions: 1024,
        }
    }
}

impl From<&ServerConfig> for TransportConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            message_path: config.message_path.clone(),
            heartbeat_interval: config.heartbeat_interval(),
            channel_capacity: config.channel_capacity,
            max_sessions: config.max_sessions,
        }
    }
}

/// Owns the registry and wires channels, catalog and handler together.
pub struct Transport {
    registry: Arc<SessionRegistry>,
    catalog: Arc<dyn ToolCatalog>,
    dispatcher: Dispatcher,
    config: TransportConfig,
}

impl Transport {
    /// Create a transport with an empty registry.
    pub fn new(
        config: TransportConfig,
        catalog: Arc<dyn ToolCatalog>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&registry), handler),
            registry,
            catalog,
            config,
        }
    }

    /// Open a new push channel.
    pub async fn open_channel(&self) -> Result<(Arc<Channel>, FrameStream), TransportError> {
        Channel::open(&self.registry, self.catalog.as_ref(), &self.config).await
    }

    /// Handle one inbound call.
    pub async fn dispatch(
        &self,
        session_id: Option<&str>,
        body: &[u8],
    ) -> Result<Acknowledgment, TransportError> {
        self.dispatcher.dispatch(session_id, body).await
    }

    /// Close one session on request.
    pub fn close_session(&self, session_id: Option<&str>) -> Result<(), TransportError> {
        let session_id = session_id
            .filter(|id| !id.is_empty())
            .ok_or(TransportError::MissingSessionId)?;
        if self.registry.remove(session_id) {
            Ok(())
        } else {
            Err(TransportError::UnknownSession(session_id.to_owned()))
        }
    }

    /// Close every open session. Returns how many were closed.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        self.registry.close_all(reason)
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// The session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}
