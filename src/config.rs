//! Wall configuration
//!
//! One JSON file holds every section. All fields have defaults except the
//! upstream endpoint and track terms, which [`WallConfig::validate`] requires.
//!
//! ```json
//! {
//!   "server":   { "bind_addr": "0.0.0.0:8080", "path": "/updates" },
//!   "upstream": { "endpoint": "stream.example.org:7000", "track": ["barcamp"] },
//!   "schedule": { "path": "schedule.json" },
//!   "updates":  { "path": "updates.json", "max_entries": 50 },
//!   "registry": { "viewer_queue_capacity": 256, "session_tick_secs": 300 },
//!   "reconnect": { "initial_backoff_ms": 1000, "max_backoff_ms": 60000 }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, WallError};
use crate::registry::RegistryConfig;
use crate::schedule::Announcements;
use crate::server::ServerConfig;
use crate::updates::UpdatesConfig;
use crate::upstream::{ReconnectPolicy, UpstreamConfig};

/// Where the schedule comes from and what to show outside it
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Schedule JSON file
    pub path: PathBuf,

    /// Before/after texts
    #[serde(flatten)]
    pub announcements: Announcements,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("schedule.json"),
            announcements: Announcements::default(),
        }
    }
}

/// Complete wall configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub schedule: ScheduleConfig,
    pub updates: UpdatesConfig,
    pub registry: RegistryConfig,
    pub reconnect: ReconnectPolicy,
}

impl WallConfig {
    /// Parse and validate a configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: WallConfig =
            serde_json::from_str(json).map_err(|e| WallError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| WallError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Check the values the wall cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.upstream.endpoint.trim().is_empty() {
            return Err(WallError::Config("upstream endpoint is empty".into()));
        }
        if self.upstream.track.iter().all(|t| t.trim().is_empty()) {
            return Err(WallError::Config("upstream track list is empty".into()));
        }
        if self.upstream.connect_timeout.is_zero() || self.upstream.stall_timeout.is_zero() {
            return Err(WallError::Config("upstream timeouts must be positive".into()));
        }
        if self.upstream.max_item_bytes == 0 {
            return Err(WallError::Config("upstream max_item_bytes must be positive".into()));
        }
        if self.registry.viewer_queue_capacity == 0 {
            return Err(WallError::Config("viewer queue capacity must be positive".into()));
        }
        if self.registry.session_tick_interval.is_zero() {
            return Err(WallError::Config("session tick interval must be positive".into()));
        }
        if self.updates.max_entries == 0 {
            return Err(WallError::Config("updates max_entries must be positive".into()));
        }
        Ok(())
    }
}

/// `Duration` fields stored as whole seconds
pub(crate) mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// `Duration` fields stored as milliseconds
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
