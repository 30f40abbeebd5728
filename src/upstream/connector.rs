//! Upstream stream client interface
//!
//! The supervisor only ever talks to the upstream through these two traits,
//! so the concrete client (TCP, HTTP, a test script) is interchangeable.

use std::future::Future;

use bytes::Bytes;

use crate::error::{Result, WallError};

/// Event produced by an open upstream stream
#[derive(Debug)]
pub enum UpstreamEvent {
    /// One raw item record
    Item(Bytes),
    /// The upstream closed the stream
    End,
    /// The stream broke
    Error(WallError),
}

/// Filter sent to the upstream when opening a stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterParams {
    /// Terms to track
    pub track: Vec<String>,
}

impl FilterParams {
    /// Create filter parameters from track terms
    pub fn new<I, S>(track: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            track: track.into_iter().map(Into::into).collect(),
        }
    }

    /// Track terms as a single comma-separated parameter
    pub fn track_param(&self) -> String {
        self.track.join(",")
    }
}

/// Opens upstream streams
pub trait StreamConnector: Send + Sync + 'static {
    /// Stream type produced by this connector
    type Stream: UpstreamStream;

    /// Open a stream and complete the upstream handshake
    fn open(&self, filter: &FilterParams) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// An open upstream stream
pub trait UpstreamStream: Send + 'static {
    /// Wait for the next event
    ///
    /// After `End` or `Error` the stream is finished and must not be polled
    /// again.
    fn next_event(&mut self) -> impl Future<Output = UpstreamEvent> + Send;

    /// Close the stream and release its resources
    fn close(self) -> impl Future<Output = ()> + Send;
}
