//! Broadcaster implementation
//!
//! The central registry of connected viewers. All registry mutations go
//! through one lock; fan-out works on a snapshot of the registry taken at
//! publish time, so slow viewers and concurrent (un)registrations never hold
//! up a publish.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::schedule::{SessionClock, SessionView, WallClock};
use crate::stats::{WallMetrics, WallStats};
use crate::updates::UpdateLog;
use crate::upstream::encode_item;

use super::config::RegistryConfig;
use super::entry::{DeliveryQueue, PushOutcome};
use super::frame::{EventKind, ViewerId, WallMessage};
use super::signal::{command_channel, CommandReceiver, CommandSender, StreamCommand};

/// Registry of connected viewers and fan-out point for everything they see
pub struct Broadcaster {
    /// Registered viewers and their delivery queues
    viewers: Mutex<HashMap<ViewerId, Arc<DeliveryQueue>>>,

    next_viewer_id: AtomicU64,

    /// Transition commands for the stream supervisor
    commands: CommandSender,

    session_clock: SessionClock,
    wall_clock: Arc<dyn WallClock>,

    updates: Arc<UpdateLog>,

    metrics: WallMetrics,

    config: RegistryConfig,
}

impl Broadcaster {
    /// Create a broadcaster
    ///
    /// Returns the broadcaster and the receiver the stream supervisor reads
    /// transition commands from.
    pub fn new(
        config: RegistryConfig,
        session_clock: SessionClock,
        wall_clock: Arc<dyn WallClock>,
        updates: Arc<UpdateLog>,
    ) -> (Arc<Self>, CommandReceiver) {
        let (commands, command_rx) = command_channel();

        let broadcaster = Self {
            viewers: Mutex::new(HashMap::new()),
            next_viewer_id: AtomicU64::new(1),
            commands,
            session_clock,
            wall_clock,
            updates,
            metrics: WallMetrics::new(),
            config,
        };

        (Arc::new(broadcaster), command_rx)
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a new viewer
    ///
    /// The returned queue already holds the current session snapshot followed
    /// by the recent updates; nobody else receives these. If this is the
    /// first viewer, the stream supervisor is told to start the upstream.
    pub fn register(&self) -> Arc<DeliveryQueue> {
        let mut viewers = self.viewers.lock();

        // Read under the registry lock so an update posted concurrently is
        // either in this replay or published to this viewer, never both
        let initial = self.initial_messages();

        let id = ViewerId(self.next_viewer_id.fetch_add(1, Ordering::Relaxed));
        let queue = Arc::new(DeliveryQueue::new(id, self.config.viewer_queue_capacity));
        for msg in initial {
            queue.push(msg);
        }

        viewers.insert(id, Arc::clone(&queue));
        let count = viewers.len();

        if count == 1 {
            self.signal(StreamCommand::EnsureStarted);
        }

        drop(viewers);

        self.metrics.record_viewer();
        tracing::info!(viewer_id = %id, viewers = count, "Viewer connected");

        queue
    }

    /// Unregister a viewer
    ///
    /// Unregistering a viewer that is not registered is a no-op. Returns
    /// whether the viewer was removed. If it was the last viewer, the stream
    /// supervisor is told to stop the upstream.
    pub fn unregister(&self, id: ViewerId) -> bool {
        let mut viewers = self.viewers.lock();

        let Some(queue) = viewers.remove(&id) else {
            return false;
        };
        let count = viewers.len();

        if count == 0 {
            self.signal(StreamCommand::EnsureStopped);
        }

        drop(viewers);

        queue.close();

        tracing::info!(
            viewer_id = %id,
            viewers = count,
            dropped = queue.dropped(),
            "Viewer disconnected"
        );

        true
    }

    fn signal(&self, command: StreamCommand) {
        tracing::debug!(command = ?command, "Subscriber count transition");

        if self.commands.send(command).is_err() {
            tracing::debug!(command = ?command, "Stream supervisor is not running");
        }
    }

    fn initial_messages(&self) -> Vec<WallMessage> {
        let mut messages = Vec::with_capacity(2);

        match WallMessage::encode(EventKind::CurrentSession, &self.current_session()) {
            Ok(msg) => messages.push(msg),
            Err(e) => tracing::warn!(error = %e, "Failed to encode session snapshot"),
        }

        match WallMessage::encode(EventKind::InitUpdates, &self.updates.recent()) {
            Ok(msg) => messages.push(msg),
            Err(e) => tracing::warn!(error = %e, "Failed to encode recent updates"),
        }

        messages
    }

    /// Deliver a message to every currently registered viewer
    ///
    /// Never waits on a viewer. Returns the number of viewers the message was
    /// queued for.
    pub fn publish(&self, msg: WallMessage) -> usize {
        let targets: Vec<Arc<DeliveryQueue>> = self.viewers.lock().values().cloned().collect();
        self.deliver(&targets, msg)
    }

    fn deliver(&self, targets: &[Arc<DeliveryQueue>], msg: WallMessage) -> usize {
        let mut dropped = 0;
        for queue in targets {
            if queue.push(msg.clone()) == PushOutcome::DroppedOldest {
                dropped += 1;
                tracing::debug!(
                    viewer_id = %queue.id(),
                    event = %msg.event,
                    "Viewer queue full, dropped oldest message"
                );
            }
        }

        self.metrics.record_queue_drops(dropped);
        targets.len()
    }

    /// Encode and publish one raw upstream item
    ///
    /// Malformed items are logged and dropped. Returns the number of viewers
    /// reached, or `None` if nothing was published.
    pub fn publish_item(&self, raw: &[u8]) -> Option<usize> {
        match encode_item(raw) {
            Ok(Some(msg)) => {
                self.metrics.record_item();
                Some(self.publish(msg))
            }
            Ok(None) => None,
            Err(e) => {
                self.metrics.record_malformed();
                tracing::warn!(
                    error = %e,
                    item = %String::from_utf8_lossy(raw),
                    "Dropping malformed upstream item"
                );
                None
            }
        }
    }

    /// Publish a session snapshot to every viewer
    pub fn broadcast_session(&self, view: &SessionView) -> usize {
        match WallMessage::encode(EventKind::CurrentSession, view) {
            Ok(msg) => self.publish(msg),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode session snapshot");
                0
            }
        }
    }

    /// Compute the current session from the wall clock
    pub fn current_session(&self) -> SessionView {
        self.session_clock.compute(self.wall_clock.now())
    }

    /// Recompute the current session and broadcast it
    pub fn tick_session(&self) -> usize {
        let view = self.current_session();
        let reached = self.broadcast_session(&view);
        self.metrics.record_session_broadcast();

        tracing::debug!(phase = ?view.phase(), viewers = reached, "Session tick");
        reached
    }

    /// Record an update and publish it to every viewer
    ///
    /// The update is persisted before anyone sees it; if that fails nothing
    /// is published. Viewers registering concurrently get it exactly once,
    /// either in their `init_updates` replay or as an `update` frame.
    pub async fn post_update(&self, update: Value) -> Result<usize> {
        let msg = WallMessage::encode(EventKind::Update, &update)?;

        let targets = self
            .updates
            .append_with(update, |record| {
                let viewers = self.viewers.lock();
                record();
                viewers.values().cloned().collect::<Vec<_>>()
            })
            .await?;

        self.metrics.record_update();
        Ok(self.deliver(&targets, msg))
    }

    /// Current number of registered viewers
    pub fn subscriber_count(&self) -> usize {
        self.viewers.lock().len()
    }

    /// Get the live counters
    pub fn metrics(&self) -> &WallMetrics {
        &self.metrics
    }

    /// Get a statistics snapshot
    pub fn stats(&self) -> WallStats {
        self.metrics.snapshot(self.subscriber_count())
    }

    /// Spawn the periodic session tick
    ///
    /// The first broadcast happens one full interval after spawning; new
    /// viewers get their snapshot at registration. Returns a handle that can
    /// be used to abort the task.
    pub fn spawn_session_tick(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let broadcaster = Arc::clone(self);
        let period = broadcaster
            .config
            .session_tick_interval
            .max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                broadcaster.tick_session();
            }
        })
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("viewers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}
