//! Error types for the event wall
//!
//! Only configuration errors are fatal, and only at startup. Everything else
//! is recovered where it happens: upstream failures trigger a reconnect,
//! malformed items are dropped, viewer transport errors disconnect that viewer.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, WallError>;

/// Error type for event wall operations
#[derive(Debug, Error)]
pub enum WallError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream stream failed to open or broke while streaming
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Upstream item that could not be encoded for viewers
    #[error("malformed upstream item: {0}")]
    MalformedItem(String),

    /// Viewer transport failed to deliver a frame
    #[error("viewer transport error: {0}")]
    Transport(String),

    /// Operation did not complete in time
    #[error("operation timed out: {0}")]
    Timeout(&'static str),
}
