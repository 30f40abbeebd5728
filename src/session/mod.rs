//! Viewer sessions
//!
//! A session ties one viewer connection to its registration in the
//! broadcaster. The transport layer detects disconnects; the session makes
//! sure the viewer is unregistered exactly once no matter how many of those
//! signals arrive.

pub mod transport;
pub mod viewer;

pub use transport::ViewerTransport;
pub use viewer::ViewerSession;
