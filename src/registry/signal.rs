//! Subscriber-count transition signals
//!
//! The broadcaster emits exactly one command per edge of the subscriber
//! count: `EnsureStarted` on 0 -> 1 and `EnsureStopped` on 1 -> 0. Commands
//! are sent while the registry lock is held, so they reach the stream
//! supervisor in the same order as the edges that caused them.

use tokio::sync::mpsc;

/// Command for the stream supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCommand {
    /// First viewer connected: open the upstream stream
    EnsureStarted,
    /// Last viewer left: close the upstream stream
    EnsureStopped,
}

/// Sending half, owned by the broadcaster
pub type CommandSender = mpsc::UnboundedSender<StreamCommand>;

/// Receiving half, owned by the stream supervisor
pub type CommandReceiver = mpsc::UnboundedReceiver<StreamCommand>;

/// Create a command channel
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    mpsc::unbounded_channel()
}
