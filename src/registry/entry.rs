//! Per-viewer delivery queue
//!
//! Each registered viewer owns one bounded FIFO. Pushing never blocks: when
//! the queue is full the oldest pending message is dropped to make room, so a
//! stalled viewer only ever loses its own backlog.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::frame::{ViewerId, WallMessage};

/// Outcome of pushing a message onto a viewer queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Message queued
    Queued,
    /// Message queued after dropping the oldest pending one
    DroppedOldest,
    /// Viewer is gone; message discarded
    Closed,
}

struct QueueState {
    messages: VecDeque<WallMessage>,
    closed: bool,
}

/// Bounded, drop-oldest queue feeding one viewer
pub struct DeliveryQueue {
    /// Viewer this queue belongs to
    id: ViewerId,

    /// Maximum pending messages
    capacity: usize,

    state: Mutex<QueueState>,

    /// Wakes the delivery loop
    notify: Notify,

    /// Messages dropped because the viewer fell behind
    dropped: AtomicU64,
}

impl DeliveryQueue {
    /// Create an empty queue
    pub(super) fn new(id: ViewerId, capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            id,
            capacity,
            state: Mutex::new(QueueState {
                messages: VecDeque::with_capacity(capacity.min(64)),
                closed: false,
            }),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Get the viewer ID
    pub fn id(&self) -> ViewerId {
        self.id
    }

    /// Push a message without blocking
    pub fn push(&self, msg: WallMessage) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }

            let outcome = if state.messages.len() >= self.capacity {
                state.messages.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Queued
            };

            state.messages.push_back(msg);
            outcome
        };

        self.notify.notify_one();
        outcome
    }

    /// Wait for the next message
    ///
    /// Returns `None` once the queue is closed. Messages still pending at
    /// close time are discarded, since the viewer is gone.
    pub async fn recv(&self) -> Option<WallMessage> {
        loop {
            {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(msg) = state.messages.pop_front() {
                    return Some(msg);
                }
            }

            self.notify.notified().await;
        }
    }

    /// Take the next message if one is pending
    pub fn try_recv(&self) -> Option<WallMessage> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        state.messages.pop_front()
    }

    /// Close the queue and wake the delivery loop
    pub(super) fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
            state.messages.clear();
        }
        self.notify.notify_one();
    }

    /// Check if the queue is closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of pending messages
    pub fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages dropped so far for this viewer
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("pending", &self.len())
            .field("dropped", &self.dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::super::frame::EventKind;
    use super::*;

    fn msg(n: u32) -> WallMessage {
        WallMessage::encode(EventKind::Tweet, &json!({ "n": n })).unwrap()
    }

    fn n_of(msg: &WallMessage) -> u64 {
        let v: serde_json::Value = serde_json::from_str(msg.as_str()).unwrap();
        v["data"]["n"].as_u64().unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let queue = DeliveryQueue::new(ViewerId(1), 8);

        for n in 0..3 {
            assert_eq!(queue.push(msg(n)), PushOutcome::Queued);
        }

        assert_eq!(n_of(&queue.try_recv().unwrap()), 0);
        assert_eq!(n_of(&queue.try_recv().unwrap()), 1);
        assert_eq!(n_of(&queue.try_recv().unwrap()), 2);
        assert!(queue.try_recv().is_none());
    }

    #[test]
    fn test_drop_oldest_when_full() {
        let queue = DeliveryQueue::new(ViewerId(1), 2);

        queue.push(msg(0));
        queue.push(msg(1));
        assert_eq!(queue.push(msg(2)), PushOutcome::DroppedOldest);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(n_of(&queue.try_recv().unwrap()), 1);
        assert_eq!(n_of(&queue.try_recv().unwrap()), 2);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let queue = DeliveryQueue::new(ViewerId(1), 0);

        assert_eq!(queue.push(msg(0)), PushOutcome::Queued);
        assert_eq!(queue.push(msg(1)), PushOutcome::DroppedOldest);
        assert_eq!(queue.len(), 1);
        assert_eq!(n_of(&queue.try_recv().unwrap()), 1);
    }

    #[test]
    fn test_push_after_close() {
        let queue = DeliveryQueue::new(ViewerId(1), 4);
        queue.push(msg(0));
        queue.close();

        assert!(queue.is_closed());
        assert!(queue.is_empty());
        assert_eq!(queue.push(msg(1)), PushOutcome::Closed);
    }

    #[test]
    fn test_recv_pending_until_push() {
        let queue = DeliveryQueue::new(ViewerId(1), 4);
        let mut recv = tokio_test::task::spawn(queue.recv());

        tokio_test::assert_pending!(recv.poll());

        queue.push(msg(7));
        assert!(recv.is_woken());

        let received = tokio_test::assert_ready!(recv.poll());
        assert_eq!(n_of(&received.unwrap()), 7);
    }

    #[tokio::test]
    async fn test_recv_waits_for_push() {
        let queue = Arc::new(DeliveryQueue::new(ViewerId(1), 4));

        let reader = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.recv().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(msg(42));

        let received = reader.await.unwrap().unwrap();
        assert_eq!(n_of(&received), 42);
    }

    #[tokio::test]
    async fn test_close_wakes_reader() {
        let queue = Arc::new(DeliveryQueue::new(ViewerId(1), 4));

        let reader = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.recv().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close();

        let received = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
        assert!(received.is_none());
    }
}
