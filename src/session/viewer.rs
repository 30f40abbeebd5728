//! Viewer session
//!
//! One `ViewerSession` exists per connected viewer. It owns the viewer's
//! registration with the [`Broadcaster`] and runs the delivery loop that moves
//! messages from the viewer's queue to its transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::registry::{Broadcaster, DeliveryQueue, ViewerId};

use super::transport::ViewerTransport;

/// A connected viewer
pub struct ViewerSession {
    id: ViewerId,
    queue: Arc<DeliveryQueue>,
    broadcaster: Arc<Broadcaster>,
    /// Set by the first disconnect
    unregistered: AtomicBool,
    connected_at: Instant,
}

impl ViewerSession {
    /// Register a new viewer with the broadcaster
    pub fn connect(broadcaster: &Arc<Broadcaster>) -> Self {
        let queue = broadcaster.register();

        Self {
            id: queue.id(),
            queue,
            broadcaster: Arc::clone(broadcaster),
            unregistered: AtomicBool::new(false),
            connected_at: Instant::now(),
        }
    }

    /// Viewer id
    pub fn id(&self) -> ViewerId {
        self.id
    }

    /// Messages this viewer lost to queue overflow
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// Time since the viewer connected
    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Whether the viewer has been disconnected
    pub fn is_disconnected(&self) -> bool {
        self.unregistered.load(Ordering::Acquire)
    }

    /// Unregister the viewer
    ///
    /// Safe to call from any number of places; only the first call reaches
    /// the broadcaster. Returns whether this call did the unregistration.
    pub fn disconnect(&self) -> bool {
        if self.unregistered.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.broadcaster.unregister(self.id);
        true
    }

    /// Deliver queued messages to `transport` in order until disconnected
    ///
    /// Returns `Ok` once the viewer is disconnected. A transport failure
    /// disconnects the viewer and is returned.
    pub async fn deliver<T: ViewerTransport>(&self, transport: &mut T) -> Result<()> {
        while let Some(msg) = self.queue.recv().await {
            if let Err(e) = transport.send(msg.as_str()).await {
                tracing::debug!(viewer_id = %self.id, error = %e, "Viewer send failed");
                self.disconnect();
                return Err(e);
            }
        }

        Ok(())
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for ViewerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerSession")
            .field("id", &self.id)
            .field("pending", &self.queue.len())
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::error::WallError;
    use crate::registry::{CommandReceiver, EventKind, RegistryConfig, StreamCommand, WallMessage};
    use crate::schedule::{Announcements, FixedClock, Schedule, SessionClock};
    use crate::updates::UpdateLog;

    /// Forwards every payload to a channel
    struct ChannelTransport(mpsc::UnboundedSender<String>);

    impl ViewerTransport for ChannelTransport {
        async fn send(&mut self, payload: &str) -> Result<()> {
            self.0
                .send(payload.to_string())
                .map_err(|_| WallError::Transport("receiver gone".into()))
        }
    }

    struct BrokenTransport;

    impl ViewerTransport for BrokenTransport {
        async fn send(&mut self, _payload: &str) -> Result<()> {
            Err(WallError::Transport("broken pipe".into()))
        }
    }

    fn broadcaster() -> (Arc<Broadcaster>, CommandReceiver) {
        let now: NaiveDateTime = "2013-03-02T07:00:00".parse().unwrap();
        let clock = SessionClock::new(Arc::new(Schedule::default()), Announcements::default());

        Broadcaster::new(
            RegistryConfig::default(),
            clock,
            Arc::new(FixedClock::new(now)),
            Arc::new(UpdateLog::in_memory(10)),
        )
    }

    fn tweet(text: &str) -> WallMessage {
        WallMessage::encode(EventKind::Tweet, &json!({ "text": text })).unwrap()
    }

    fn event_name(payload: &str) -> String {
        let frame: Value = serde_json::from_str(payload).unwrap();
        frame["event"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_delivers_in_publish_order() {
        let (broadcaster, _rx) = broadcaster();
        let session = Arc::new(ViewerSession::connect(&broadcaster));

        broadcaster.publish(tweet("a"));
        broadcaster.publish(tweet("b"));

        let (tx, mut sent) = mpsc::unbounded_channel();
        let delivering = Arc::clone(&session);
        let task = tokio::spawn(async move {
            delivering.deliver(&mut ChannelTransport(tx)).await
        });

        assert_eq!(event_name(&sent.recv().await.unwrap()), "current_session");
        assert_eq!(event_name(&sent.recv().await.unwrap()), "init_updates");
        assert!(sent.recv().await.unwrap().contains("\"a\""));
        assert!(sent.recv().await.unwrap().contains("\"b\""));

        broadcaster.publish(tweet("c"));
        assert!(sent.recv().await.unwrap().contains("\"c\""));

        assert!(session.disconnect());
        assert!(task.await.unwrap().is_ok());
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_disconnects_unregister_once() {
        let (broadcaster, mut rx) = broadcaster();
        let session = Arc::new(ViewerSession::connect(&broadcaster));
        assert_eq!(rx.try_recv().unwrap(), StreamCommand::EnsureStarted);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let session = Arc::clone(&session);
            tasks.push(tokio::spawn(async move { session.disconnect() }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert!(session.is_disconnected());
        assert_eq!(rx.try_recv().unwrap(), StreamCommand::EnsureStopped);

        drop(session);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_transport_failure_isolated_to_viewer() {
        let (broadcaster, _rx) = broadcaster();
        let broken = ViewerSession::connect(&broadcaster);
        let healthy = ViewerSession::connect(&broadcaster);

        let result = broken.deliver(&mut BrokenTransport).await;
        assert!(matches!(result, Err(WallError::Transport(_))));
        assert!(broken.is_disconnected());
        assert_eq!(broadcaster.subscriber_count(), 1);

        assert_eq!(broadcaster.publish(tweet("still here")), 1);
        // Snapshot, replay, tweet
        assert_eq!(healthy.queue.len(), 3);
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let (broadcaster, mut rx) = broadcaster();

        let session = ViewerSession::connect(&broadcaster);
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(session.dropped(), 0);

        drop(session);
        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(rx.try_recv().unwrap(), StreamCommand::EnsureStarted);
        assert_eq!(rx.try_recv().unwrap(), StreamCommand::EnsureStopped);
    }
}
