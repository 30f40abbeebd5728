//! Upstream item stream
//!
//! One [`StreamSupervisor`] owns the single upstream connection. It opens the
//! stream when the first viewer arrives, closes it when the last one leaves,
//! and reconnects with backoff in between.

pub mod backoff;
pub mod config;
pub mod connector;
pub mod encode;
pub mod state;
pub mod supervisor;
pub mod tcp;

pub use backoff::ReconnectPolicy;
pub use config::{Credentials, UpstreamConfig};
pub use connector::{FilterParams, StreamConnector, UpstreamEvent, UpstreamStream};
pub use encode::encode_item;
pub use state::SupervisorState;
pub use supervisor::{StreamSupervisor, SupervisorHandle};
pub use tcp::{TcpJsonConnector, TcpJsonStream};
