//! Periodic heartbeat frames for an open channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::channel::Channel;
use super::frame::Frame;
use crate::metrics::SSE_HEARTBEATS_TOTAL;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The heartbeat was cancelled by channel close.
    Cancelled,
    /// A heartbeat write failed.
    WriteFailed,
}

/// Write a [`Frame::Heartbeat`] every `interval` until `cancel` fires or a
/// write fails. The first frame goes out one full interval after start.
pub async fn run_heartbeat(
    channel: Arc<Channel>,
    interval: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
            _ = ticker.tick() => {
                if channel.write_frame(Frame::heartbeat()).await.is_err() {
                    if cancel.is_cancelled() {
                        return HeartbeatResult::Cancelled;
                    }
                    debug!(session_id = %channel.id(), "heartbeat write failed");
                    return HeartbeatResult::WriteFailed;
                }
                metrics::counter!(SSE_HEARTBEATS_TOTAL).increment(1);
            }
        }
    }
}

/// Spawn [`run_heartbeat`] on the current runtime.
pub fn spawn_heartbeat(
    channel: Arc<Channel>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<HeartbeatResult> {
    tokio::spawn(run_heartbeat(channel, interval, cancel))
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use tether_core::tools::EmptyCatalog;
    use tokio::sync::mpsc;

    use super::*;
    use crate::transport::TransportConfig;
    use crate::transport::channel::{CloseReason, FrameStream};
    use crate::transport::registry::SessionRegistry;

    async fn open_with(interval: Duration) -> (Arc<SessionRegistry>, Arc<Channel>, FrameStream) {
        let registry = Arc::new(SessionRegistry::new());
        let config = TransportConfig {
            heartbeat_interval: interval,
            ..TransportConfig::default()
        };
        let (channel, mut stream) = Channel::open(&registry, &EmptyCatalog, &config)
            .await
            .unwrap();
        // handshake + capabilities
        let _ = stream.next().await.unwrap();
        let _ = stream.next().await.unwrap();
        (registry, channel, stream)
    }

    #[tokio::test(start_paused = true)]
    async fn ping_within_one_interval_window() {
        let (_registry, channel, mut stream) = open_with(Duration::from_secs(30)).await;

        let frame = time::timeout(Duration::from_secs(31), stream.next())
            .await
            .expect("a heartbeat within 31s")
            .unwrap();
        assert!(matches!(frame, Frame::Heartbeat { .. }));
        assert!(channel.last_heartbeat_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn no_ping_before_first_interval() {
        let (_registry, _channel, mut stream) = open_with(Duration::from_secs(30)).await;
        let early = time::timeout(Duration::from_secs(29), stream.next()).await;
        assert!(early.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn pings_repeat_at_interval() {
        let (_registry, _channel, stream) = open_with(Duration::from_secs(1)).await;
        let pings: Vec<Frame> = stream.take(3).collect().await;
        assert!(pings.iter().all(|f| matches!(f, Frame::Heartbeat { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn no_heartbeat_after_close() {
        let (_registry, channel, mut stream) = open_with(Duration::from_secs(1)).await;
        for _ in 0..2 {
            let _ = stream.next().await.unwrap();
        }

        assert!(channel.close(CloseReason::Explicit));
        let closed_at = channel.closed_at().unwrap();
        let last = channel.last_heartbeat_at().unwrap();
        assert!(last <= closed_at);

        time::advance(Duration::from_secs(10)).await;
        let rest: Vec<Frame> = stream.collect().await;
        for frame in rest {
            match frame {
                Frame::Heartbeat { at } => assert!(at <= closed_at),
                other => panic!("unexpected frame {other:?}"),
            }
        }
        assert_eq!(channel.last_heartbeat_at(), Some(last));
    }

    #[tokio::test]
    async fn cancelled_before_first_tick() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, _rx) = mpsc::channel(4);
        let weak = Arc::downgrade(&registry);
        let cancel = CancellationToken::new();
        let channel = registry
            .register(4, |id| Channel::new(id, tx, cancel.clone(), weak))
            .unwrap();

        let handle = spawn_heartbeat(channel, Duration::from_secs(60), cancel.clone());
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_ends_loop() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, rx) = mpsc::channel(4);
        let weak = Arc::downgrade(&registry);
        let channel = registry
            .register(4, |id| Channel::new(id, tx, CancellationToken::new(), weak))
            .unwrap();
        drop(rx);

        // A separate token so the close triggered by the failed write does not
        // read as a cancellation.
        let result = run_heartbeat(
            Arc::clone(&channel),
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(result, HeartbeatResult::WriteFailed);
        assert_eq!(channel.close_reason(), Some(CloseReason::WriteFailed));
    }
}
