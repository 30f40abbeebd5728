//! Stream supervisor state machine
//!
//! ```text
//!            EnsureStarted               handshake ok
//!   Idle ─────────────────► Connecting ─────────────► Streaming
//!    ▲                        ▲    │                      │
//!    │ EnsureStopped          │    │ open failed          │ end / error
//!    │ (from any state)       │    ▼                      │
//!    │                      BackingOff ◄──────────────────┘
//! ```
//!
//! A reconnect with zero delay goes straight from Streaming back to
//! Connecting without passing through BackingOff.

/// Supervisor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisorState {
    /// No viewers, no upstream stream
    #[default]
    Idle,
    /// Opening the upstream stream
    Connecting,
    /// Upstream stream open, items flowing to the broadcaster
    Streaming,
    /// Waiting before the next reconnect attempt
    BackingOff,
}

impl SupervisorState {
    /// State name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::Idle => "idle",
            SupervisorState::Connecting => "connecting",
            SupervisorState::Streaming => "streaming",
            SupervisorState::BackingOff => "backing-off",
        }
    }
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
