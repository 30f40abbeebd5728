//! # event-wall
//!
//! Live event wall server. Viewers connect over WebSocket and receive, in
//! real time, items from one filtered upstream stream, the session currently
//! running according to the event schedule, and updates posted by the
//! organizers.
//!
//! The upstream stream is opened only while at least one viewer is connected:
//! the [`Broadcaster`] counts viewers and tells the [`StreamSupervisor`] when
//! the count goes from zero to one and back.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use event_wall::{
//!     Broadcaster, FilterParams, ReconnectPolicy, RegistryConfig, Schedule, ServerConfig,
//!     SessionClock, StreamSupervisor, SystemClock, TcpJsonConnector, UpdateLog,
//!     UpstreamConfig, WallServer,
//! };
//!
//! # async fn run() -> event_wall::Result<()> {
//! let schedule = Arc::new(Schedule::from_file("schedule.json")?);
//! let clock = SessionClock::new(schedule, Default::default());
//!
//! let (broadcaster, commands) = Broadcaster::new(
//!     RegistryConfig::default(),
//!     clock,
//!     Arc::new(SystemClock),
//!     Arc::new(UpdateLog::in_memory(50)),
//! );
//!
//! let upstream = UpstreamConfig::new("stream.example.org:7000", ["barcamp"]);
//! let _supervisor = StreamSupervisor::new(
//!     TcpJsonConnector::new(upstream),
//!     FilterParams::new(["barcamp"]),
//!     ReconnectPolicy::default(),
//!     Arc::clone(&broadcaster),
//!     commands,
//! )
//! .spawn();
//!
//! WallServer::new(ServerConfig::default(), broadcaster).run().await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod schedule;
pub mod server;
pub mod session;
pub mod stats;
pub mod updates;
pub mod upstream;

pub use config::{ScheduleConfig, WallConfig};
pub use error::{Result, WallError};
pub use registry::{Broadcaster, EventKind, RegistryConfig, ViewerId, WallMessage};
pub use schedule::{Announcements, Schedule, SessionClock, SessionView, Slot, SystemClock, WallClock};
pub use server::{ServerConfig, WallServer};
pub use session::{ViewerSession, ViewerTransport};
pub use stats::WallStats;
pub use updates::{UpdateLog, UpdatesConfig};
pub use upstream::{
    FilterParams, ReconnectPolicy, StreamConnector, StreamSupervisor, SupervisorState,
    TcpJsonConnector, UpstreamConfig,
};
