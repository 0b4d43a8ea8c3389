//! Per-call split between "acknowledge this inbound call" and "write to the
//! long-lived channel".

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Value, json};
use tether_core::SessionId;
use tracing::{debug, error, warn};

use super::channel::Channel;
use super::frame::Frame;
use super::handler::MessageHandler;
use crate::errors::TransportError;

/// Capabilities handed to a [`MessageHandler`] for one inbound call.
///
/// A fresh responder is built for every call, so nothing recorded here can
/// outlive the call it belongs to.
pub struct Responder {
    channel: Arc<Channel>,
    acknowledgment: Option<Value>,
    pushed: usize,
}

impl Responder {
    pub(crate) fn new(channel: Arc<Channel>) -> Self {
        Self {
            channel,
            acknowledgment: None,
            pushed: 0,
        }
    }

    /// Session this call belongs to.
    pub fn session_id(&self) -> &SessionId {
        self.channel.id()
    }

    /// Write `payload` to the session's channel as a `message` frame.
    pub async fn push<T>(&mut self, payload: &T) -> Result<(), TransportError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_value(payload)
            .map_err(|e| TransportError::HandlerFailure(format!("unserializable payload: {e}")))?;
        self.channel.write_frame(Frame::Message { payload }).await?;
        self.pushed += 1;
        Ok(())
    }

    /// Set the body of the call's acknowledgment. The first call wins.
    pub fn acknowledge(&mut self, body: Value) -> bool {
        if self.acknowledgment.is_some() {
            return false;
        }
        self.acknowledgment = Some(body);
        true
    }

    /// Number of frames pushed during this call.
    pub fn pushed(&self) -> usize {
        self.pushed
    }

    fn into_acknowledgment(self) -> Acknowledgment {
        Acknowledgment {
            status: StatusCode::OK,
            body: self.acknowledgment.unwrap_or_else(default_ack),
        }
    }
}

/// The single response to an inbound call.
#[derive(Clone, Debug, PartialEq)]
pub struct Acknowledgment {
    /// HTTP status.
    pub status: StatusCode,
    /// JSON body.
    pub body: Value,
}

impl IntoResponse for Acknowledgment {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn default_ack() -> Value {
    json!({ "status": "ok" })
}

/// Run `handler` for one message and produce exactly one acknowledgment.
///
/// Handler errors and panics become `HandlerFailure`; the channel is left
/// open either way.
pub async fn reconcile(
    channel: Arc<Channel>,
    handler: &dyn MessageHandler,
    message: Value,
) -> Result<Acknowledgment, TransportError> {
    let mut responder = Responder::new(channel);
    let outcome = AssertUnwindSafe(handler.handle(message, &mut responder))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => {
            debug!(
                session_id = %responder.session_id(),
                pushed = responder.pushed(),
                "message acknowledged"
            );
            Ok(responder.into_acknowledgment())
        }
        Ok(Err(e)) => {
            warn!(session_id = %responder.session_id(), error = %e, "message handler failed");
            Err(TransportError::HandlerFailure(e.to_string()))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(session_id = %responder.session_id(), panic = %message, "message handler panicked");
            Err(TransportError::HandlerFailure(message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    }
}
