//! One live push channel: the session's state holder and sole writer.
//!
//! Lock order is registry table → lifecycle. The heartbeat handle lock is
//! only ever taken after the lifecycle lock or on its own.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::Stream;
use parking_lot::Mutex;
use tether_core::{SessionId, ToolCatalog};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, info, instrument};

use super::TransportConfig;
use super::frame::Frame;
use super::heartbeat::{self, HeartbeatResult};
use super::registry::SessionRegistry;
use crate::errors::TransportError;
use crate::metrics::{SSE_CHANNELS_ACTIVE, SSE_CHANNELS_CLOSED_TOTAL, SSE_CHANNELS_OPENED_TOTAL};

/// Extra buffer slots for the handshake frames, so `open` never waits on a
/// reader that has not been handed the stream yet.
const HANDSHAKE_FRAMES: usize = 2;

/// Lifecycle of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, handshake in progress.
    Created,
    /// Handshake written, heartbeat running.
    Active,
    /// Teardown in progress.
    Closing,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// `Created` or `Active`.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Created | Self::Active)
    }
}

/// Why a channel was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Client asked for it.
    Explicit,
    /// The response body was dropped.
    Disconnected,
    /// A write found the reader gone.
    WriteFailed,
    /// Server shutdown.
    Shutdown,
}

impl CloseReason {
    /// Label value for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Disconnected => "disconnected",
            Self::WriteFailed => "write_failed",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Lifecycle {
    state: SessionState,
    last_heartbeat_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    close_reason: Option<CloseReason>,
}

/// A registered push channel.
pub struct Channel {
    id: SessionId,
    tx: mpsc::Sender<Frame>,
    created_at: DateTime<Utc>,
    lifecycle: Mutex<Lifecycle>,
    cancel: CancellationToken,
    heartbeat: Mutex<Option<JoinHandle<HeartbeatResult>>>,
    registry: Weak<SessionRegistry>,
}

impl Channel {
    pub(crate) fn new(
        id: SessionId,
        tx: mpsc::Sender<Frame>,
        cancel: CancellationToken,
        registry: Weak<SessionRegistry>,
    ) -> Self {
        Self {
            id,
            tx,
            created_at: Utc::now(),
            lifecycle: Mutex::new(Lifecycle {
                state: SessionState::Created,
                last_heartbeat_at: None,
                closed_at: None,
                close_reason: None,
            }),
            cancel,
            heartbeat: Mutex::new(None),
            registry,
        }
    }

    /// Register a new channel, write the handshake and capabilities frames,
    /// and start its heartbeat.
    ///
    /// The returned [`FrameStream`] is the reading end; dropping it closes the
    /// channel.
    #[instrument(skip_all, fields(session_id = tracing::field::Empty))]
    pub async fn open(
        registry: &Arc<SessionRegistry>,
        catalog: &dyn ToolCatalog,
        config: &TransportConfig,
    ) -> Result<(Arc<Self>, FrameStream), TransportError> {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1) + HANDSHAKE_FRAMES);
        let cancel = CancellationToken::new();
        let weak = Arc::downgrade(registry);
        let channel =
            registry.register(config.max_sessions, |id| Self::new(id, tx, cancel, weak))?;
        let _ = tracing::Span::current().record("session_id", channel.id.as_str());
        metrics::counter!(SSE_CHANNELS_OPENED_TOTAL).increment(1);
        metrics::gauge!(SSE_CHANNELS_ACTIVE).increment(1.0);
        let stream = FrameStream::new(rx, Arc::clone(&channel));

        channel
            .write_frame(Frame::handshake(&config.message_path, &channel.id))
            .await?;
        channel
            .write_frame(Frame::Capabilities {
                tools: catalog.list(),
            })
            .await?;
        channel.start_heartbeat(config.heartbeat_interval);
        info!(session_id = %channel.id, "channel opened");
        Ok((channel, stream))
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lifecycle.lock().state
    }

    /// Whether the channel accepts writes.
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// When the channel was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Timestamp of the last heartbeat frame written.
    pub fn last_heartbeat_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.lock().last_heartbeat_at
    }

    /// When the channel closed.
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.lock().closed_at
    }

    /// Why the channel closed.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.lifecycle.lock().close_reason
    }

    /// Write one frame, waiting for buffer space.
    ///
    /// Fails with `ChannelClosed` once the channel is no longer open. Finding
    /// the reader gone closes the channel.
    pub async fn write_frame(&self, frame: Frame) -> Result<(), TransportError> {
        let permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(self.closed_error()),
            reserved = self.tx.reserve() => match reserved {
                Ok(permit) => permit,
                Err(_) => {
                    let _ = self.close(CloseReason::WriteFailed);
                    return Err(self.closed_error());
                }
            },
        };

        let mut lifecycle = self.lifecycle.lock();
        if !lifecycle.state.is_open() {
            return Err(self.closed_error());
        }
        if let Frame::Heartbeat { at } = &frame {
            lifecycle.last_heartbeat_at = Some(*at);
        }
        permit.send(frame);
        Ok(())
    }

    /// Close the channel. Returns `false` if it was already closed.
    ///
    /// Cancels the heartbeat, removes the registry entry and records
    /// `closed_at` in one step.
    pub fn close(&self, reason: CloseReason) -> bool {
        let registry = self.registry.upgrade();
        let mut table = registry.as_ref().map(|r| r.table());
        let mut lifecycle = self.lifecycle.lock();
        if !lifecycle.state.is_open() {
            return false;
        }

        lifecycle.state = SessionState::Closing;
        self.cancel.cancel();
        if let Some(handle) = self.heartbeat.lock().take() {
            handle.abort();
        }
        if let Some(table) = table.as_mut() {
            let _ = table.remove(&self.id);
        }
        lifecycle.state = SessionState::Closed;
        lifecycle.closed_at = Some(Utc::now());
        lifecycle.close_reason = Some(reason);
        drop(lifecycle);
        drop(table);

        metrics::counter!(SSE_CHANNELS_CLOSED_TOTAL, "reason" => reason.as_str()).increment(1);
        metrics::gauge!(SSE_CHANNELS_ACTIVE).decrement(1.0);
        info!(session_id = %self.id, %reason, "channel closed");
        true
    }

    fn start_heartbeat(self: &Arc<Self>, interval: Duration) {
        let handle = heartbeat::spawn_heartbeat(Arc::clone(self), interval, self.cancel.clone());
        *self.heartbeat.lock() = Some(handle);
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == SessionState::Created {
                lifecycle.state = SessionState::Active;
            }
        }
        // close() may have run between the spawn and the store
        if !self.is_open() {
            if let Some(handle) = self.heartbeat.lock().take() {
                handle.abort();
            }
        }
    }

    fn closed_error(&self) -> TransportError {
        TransportError::ChannelClosed(self.id.to_string())
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Reading end of a channel.
///
/// Yields queued frames, then ends once the channel closes. Dropping it
/// closes the channel with [`CloseReason::Disconnected`].
pub struct FrameStream {
    rx: mpsc::Receiver<Frame>,
    closed: Pin<Box<WaitForCancellationFutureOwned>>,
    channel: Arc<Channel>,
}

impl FrameStream {
    fn new(rx: mpsc::Receiver<Frame>, channel: Arc<Channel>) -> Self {
        let closed = Box::pin(channel.cancel.clone().cancelled_owned());
        Self {
            rx,
            closed,
            channel,
        }
    }

    /// The channel this stream reads from.
    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }
}

impl fmt::Debug for FrameStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameStream")
            .field("channel", &self.channel.id)
            .field("queued", &self.rx.len())
            .finish_non_exhaustive()
    }
}

impl Stream for FrameStream {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(frame) => Poll::Ready(frame),
            Poll::Pending => match this.closed.as_mut().poll(cx) {
                Poll::Ready(()) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        if self.channel.close(CloseReason::Disconnected) {
            debug!(session_id = %self.channel.id, "reader dropped");
        }
    }
}
