//! Viewer registry and fan-out
//!
//! The registry tracks connected viewers and routes everything they see:
//! upstream items, session snapshots and posted updates.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<Broadcaster>
//!                   ┌──────────────────────────┐
//!                   │ viewers: HashMap<Id,     │
//!                   │   Arc<DeliveryQueue>>    │──── StreamCommand ───► [StreamSupervisor]
//!                   │ commands: mpsc::Tx       │     (0->1, 1->0 only)         │
//!                   └────────────┬─────────────┘                               │
//!                                │                         publish_item() ◄────┘
//!        ┌───────────────────────┼───────────────────────┐
//!        ▼                       ▼                       ▼
//!  [DeliveryQueue]         [DeliveryQueue]         [DeliveryQueue]
//!   queue.recv()            queue.recv()            queue.recv()
//!        │                       │                       │
//!        └──► ViewerSession::deliver() ──► WebSocket text frame
//! ```
//!
//! # Isolation
//!
//! Each viewer has its own bounded queue with a drop-oldest policy. Publishing
//! copies the list of queues under the registry lock, releases the lock, and
//! pushes to each queue without waiting, so one stalled viewer can neither
//! block the others nor the upstream intake.

pub mod config;
pub mod entry;
pub mod frame;
pub mod signal;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{DeliveryQueue, PushOutcome};
pub use frame::{ascii_escape, EventKind, ViewerId, WallMessage};
pub use signal::{command_channel, CommandReceiver, CommandSender, StreamCommand};
pub use store::Broadcaster;
