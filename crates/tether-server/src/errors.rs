//! Transport error taxonomy and its HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Failures surfaced by the transport.
///
/// Every variant is contained to one call or one channel.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The inbound call carried no `sessionId`.
    #[error("missing sessionId parameter")]
    MissingSessionId,

    /// The inbound body was not valid JSON.
    #[error("malformed message body: {0}")]
    MalformedBody(String),

    /// No open session has this id.
    #[error("no session found for id {0}")]
    UnknownSession(String),

    /// The message handler returned an error or panicked.
    #[error("message handler failed: {0}")]
    HandlerFailure(String),

    /// The channel is closed or its reader is gone.
    #[error("channel {0} is closed")]
    ChannelClosed(String),

    /// Too many channels are open.
    #[error("session limit of {0} reached")]
    SessionLimitReached(usize),
}

impl TransportError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingSessionId => "MISSING_SESSION_ID",
            Self::MalformedBody(_) => "MALFORMED_BODY",
            Self::UnknownSession(_) => "UNKNOWN_SESSION",
            Self::HandlerFailure(_) => "HANDLER_FAILURE",
            Self::ChannelClosed(_) => "CHANNEL_CLOSED",
            Self::SessionLimitReached(_) => "SESSION_LIMIT_REACHED",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingSessionId | Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::UnknownSession(_) => StatusCode::NOT_FOUND,
            Self::HandlerFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ChannelClosed(_) => StatusCode::GONE,
            Self::SessionLimitReached(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.code(),
            message: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}
