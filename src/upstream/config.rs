//! Upstream client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::secs;

/// Credentials presented to the upstream stream
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token_key: String,
    pub access_token_secret: String,
}

impl Credentials {
    /// Whether any credential is missing
    pub fn is_incomplete(&self) -> bool {
        self.consumer_key.is_empty()
            || self.consumer_secret.is_empty()
            || self.access_token_key.is_empty()
            || self.access_token_secret.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("access_token_key", &self.access_token_key)
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

/// Upstream stream client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// `host:port` of the upstream stream endpoint
    pub endpoint: String,

    /// Terms to track
    pub track: Vec<String>,

    /// Credentials sent with the filter request
    pub credentials: Credentials,

    /// Connection + handshake must complete within this time
    #[serde(rename = "connect_timeout_secs", with = "secs")]
    pub connect_timeout: Duration,

    /// Treat the stream as broken if nothing (not even a keep-alive)
    /// arrives for this long
    #[serde(rename = "stall_timeout_secs", with = "secs")]
    pub stall_timeout: Duration,

    /// Longest accepted item record, in bytes
    pub max_item_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            track: Vec::new(),
            credentials: Credentials::default(),
            connect_timeout: Duration::from_secs(10),
            stall_timeout: Duration::from_secs(90),
            max_item_bytes: 1024 * 1024,
        }
    }
}

impl UpstreamConfig {
    /// Create a config for an endpoint and track terms
    pub fn new<I, S>(endpoint: impl Into<String>, track: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoint: endpoint.into(),
            track: track.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set credentials
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set stall timeout
    pub fn stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Set the maximum item record size
    pub fn max_item_bytes(mut self, max: usize) -> Self {
        self.max_item_bytes = max;
        self
    }
}
