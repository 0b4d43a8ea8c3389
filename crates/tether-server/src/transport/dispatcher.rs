//! Routes an inbound call to its session's channel.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, instrument};

use super::handler::MessageHandler;
use super::registry::SessionRegistry;
use super::responder::{Acknowledgment, reconcile};
use crate::errors::TransportError;
use crate::metrics::{INBOUND_CALL_DURATION_SECONDS, INBOUND_CALLS_TOTAL};

/// Validates inbound calls and hands them to the message handler.
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    handler: Arc<dyn MessageHandler>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    pub fn new(registry: Arc<SessionRegistry>, handler: Arc<dyn MessageHandler>) -> Self {
        Self { registry, handler }
    }

    /// Handle one inbound call.
    ///
    /// Checks run in order: session id present, session open, body is JSON.
    /// Nothing in the registry changes when any check fails.
    #[instrument(skip(self, body), fields(body_len = body.len()))]
    pub async fn dispatch(
        &self,
        session_id: Option<&str>,
        body: &[u8],
    ) -> Result<Acknowledgment, TransportError> {
        let started = Instant::now();
        let result = self.route(session_id, body).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        metrics::counter!(INBOUND_CALLS_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(INBOUND_CALL_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(outcome, "inbound call handled");
        result
    }

    async fn route(
        &self,
        session_id: Option<&str>,
        body: &[u8],
    ) -> Result<Acknowledgment, TransportError> {
        let session_id = session_id
            .filter(|id| !id.is_empty())
            .ok_or(TransportError::MissingSessionId)?;
        let channel = self.registry.lookup(session_id)?;
        let message: Value = serde_json::from_slice(body)
            .map_err(|e| TransportError::MalformedBody(e.to_string()))?;
        reconcile(channel, self.handler.as_ref(), message).await
    }
}
