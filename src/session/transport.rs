//! Viewer transport interface

use std::future::Future;

use crate::error::Result;

/// Outbound half of a viewer connection
///
/// Implemented by the WebSocket server; tests use in-memory transports.
pub trait ViewerTransport: Send {
    /// Send one text payload to the viewer
    fn send(&mut self, payload: &str) -> impl Future<Output = Result<()>> + Send;
}
