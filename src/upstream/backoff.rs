//! Reconnect backoff policy

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::config::millis;

/// Delay between upstream reconnect attempts
///
/// The first reconnect after a stream that delivered items is immediate.
/// Consecutive failures back off exponentially up to `max_backoff`, with
/// optional ±30% jitter. Attempts never stop while viewers are connected.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay after the first failure
    #[serde(rename = "initial_backoff_ms", with = "millis")]
    pub initial_backoff: Duration,

    /// Upper bound for any delay
    #[serde(rename = "max_backoff_ms", with = "millis")]
    pub max_backoff: Duration,

    /// Growth factor per consecutive failure
    pub multiplier: f64,

    /// Randomize delays by ±30%
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ReconnectPolicy {
    /// Set the initial backoff
    pub fn initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    /// Set the maximum backoff
    pub fn max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    /// Set the backoff multiplier
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Disable jitter
    pub fn no_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before the next attempt after `failures` consecutive failures
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let max = self.max_backoff.as_secs_f64();
        let growth = self.multiplier.max(1.0).powi((failures - 1).min(64) as i32);
        let mut secs = (self.initial_backoff.as_secs_f64() * growth).min(max);

        if self.jitter {
            secs *= rand::thread_rng().gen_range(0.7..1.3);
        }

        Duration::from_secs_f64(secs.min(max).max(0.0))
    }
}
