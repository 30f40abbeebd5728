//! Statistics for the event wall

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters, updated lock-free from every component
#[derive(Debug)]
pub struct WallMetrics {
    total_viewers: AtomicU64,
    items_published: AtomicU64,
    malformed_items: AtomicU64,
    queue_drops: AtomicU64,
    upstream_connects: AtomicU64,
    upstream_failures: AtomicU64,
    session_broadcasts: AtomicU64,
    updates_posted: AtomicU64,
    started_at: Instant,
}

impl WallMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            total_viewers: AtomicU64::new(0),
            items_published: AtomicU64::new(0),
            malformed_items: AtomicU64::new(0),
            queue_drops: AtomicU64::new(0),
            upstream_connects: AtomicU64::new(0),
            upstream_failures: AtomicU64::new(0),
            session_broadcasts: AtomicU64::new(0),
            updates_posted: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Count a newly registered viewer
    pub fn record_viewer(&self) {
        self.total_viewers.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an upstream item fanned out to viewers
    pub fn record_item(&self) {
        self.items_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an upstream item dropped as malformed
    pub fn record_malformed(&self) {
        self.malformed_items.fetch_add(1, Ordering::Relaxed);
    }

    /// Add messages dropped from full viewer queues
    pub fn record_queue_drops(&self, n: u64) {
        if n > 0 {
            self.queue_drops.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Count a successful upstream connection
    pub fn record_upstream_connect(&self) {
        self.upstream_connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an upstream connect failure, error or end
    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a session snapshot sent by the tick
    pub fn record_session_broadcast(&self) {
        self.session_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an update posted to the wall
    pub fn record_update(&self) {
        self.updates_posted.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot, given the current viewer count
    pub fn snapshot(&self, current_viewers: usize) -> WallStats {
        WallStats {
            current_viewers,
            total_viewers: self.total_viewers.load(Ordering::Relaxed),
            items_published: self.items_published.load(Ordering::Relaxed),
            malformed_items: self.malformed_items.load(Ordering::Relaxed),
            queue_drops: self.queue_drops.load(Ordering::Relaxed),
            upstream_connects: self.upstream_connects.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            session_broadcasts: self.session_broadcasts.load(Ordering::Relaxed),
            updates_posted: self.updates_posted.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for WallMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time wall statistics
#[derive(Debug, Clone, Default)]
pub struct WallStats {
    /// Currently connected viewers
    pub current_viewers: usize,
    /// Viewers ever connected
    pub total_viewers: u64,
    /// Upstream items fanned out
    pub items_published: u64,
    /// Upstream items dropped as malformed
    pub malformed_items: u64,
    /// Messages dropped from full viewer queues
    pub queue_drops: u64,
    /// Successful upstream connections
    pub upstream_connects: u64,
    /// Upstream connect failures, errors and ends
    pub upstream_failures: u64,
    /// Session snapshots broadcast by the tick
    pub session_broadcasts: u64,
    /// Updates posted to the wall
    pub updates_posted: u64,
    /// Time since startup
    pub uptime: Duration,
}

impl WallStats {
    /// Upstream items per second since startup
    pub fn item_rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.items_published as f64 / secs
        } else {
            0.0
        }
    }
}
