//! Seam between the transport and the protocol spoken over it.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::responder::Responder;
use crate::errors::TransportError;

/// Errors a [`MessageHandler`] may return.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Writing to the channel failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The handler could not process the message.
    #[error("{0}")]
    Failed(String),
}

/// Processes one inbound message for a session.
///
/// Protocol output goes through [`Responder::push`]; an explicit call body
/// through [`Responder::acknowledge`]. Returning `Err` (or panicking) turns
/// the call into a 500 while the channel stays open.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a parsed JSON message.
    async fn handle(&self, message: Value, responder: &mut Responder) -> Result<(), HandlerError>;
}
