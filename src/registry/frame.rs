//! Wall message types for viewer fan-out
//!
//! Every delivery to a viewer is one JSON text frame of the form
//! `{"event": <name>, "data": <payload>}`. Frames are encoded once and shared
//! by all viewer queues: cloning a `WallMessage` only bumps a reference count.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;

/// Unique identifier for a connected viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(pub u64);

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// Kind of wall message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Item relayed from the upstream stream
    Tweet,
    /// Current session snapshot
    CurrentSession,
    /// Recent updates replayed to a newly connected viewer
    InitUpdates,
    /// A freshly posted update
    Update,
}

impl EventKind {
    /// Event name as seen by viewers
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Tweet => "tweet",
            EventKind::CurrentSession => "current_session",
            EventKind::InitUpdates => "init_updates",
            EventKind::Update => "update",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: ?Sized> {
    event: &'static str,
    data: &'a T,
}

/// An encoded frame ready to be sent to viewers
#[derive(Debug, Clone)]
pub struct WallMessage {
    /// Kind of message
    pub event: EventKind,
    /// Transport-safe (pure ASCII) JSON text
    pub payload: Arc<str>,
}

impl WallMessage {
    /// Encode `data` under the given event name
    pub fn encode<T: Serialize + ?Sized>(event: EventKind, data: &T) -> Result<Self> {
        let frame = serde_json::to_string(&Envelope {
            event: event.as_str(),
            data,
        })?;

        Ok(Self {
            event,
            payload: ascii_escape(&frame).into(),
        })
    }

    /// Payload text
    pub fn as_str(&self) -> &str {
        &self.payload
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Escape every non-ASCII character of a JSON document as `\uXXXX`
///
/// serde_json only emits non-ASCII characters inside string literals, where
/// the escaped form is equivalent. Characters outside the BMP become a
/// surrogate pair.
pub fn ascii_escape(json: &str) -> String {
    if json.is_ascii() {
        return json.to_string();
    }

    let mut out = String::with_capacity(json.len() + 16);
    let mut units = [0u16; 2];

    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{:04x}", unit);
            }
        }
    }

    out
}
