//! Registry configuration

use std::time::Duration;

use serde::Deserialize;

use crate::config::secs;

/// Broadcaster configuration options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Pending messages kept per viewer before the oldest is dropped
    pub viewer_queue_capacity: usize,

    /// How often the current session is recomputed and broadcast
    #[serde(rename = "session_tick_secs", with = "secs")]
    pub session_tick_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            viewer_queue_capacity: 256,
            session_tick_interval: Duration::from_secs(300),
        }
    }
}

impl RegistryConfig {
    /// Set the per-viewer queue capacity
    pub fn viewer_queue_capacity(mut self, capacity: usize) -> Self {
        self.viewer_queue_capacity = capacity;
        self
    }

    /// Set the session tick interval
    pub fn session_tick_interval(mut self, interval: Duration) -> Self {
        self.session_tick_interval = interval;
        self
    }
}
