//! Schedule slots
//!
//! A schedule is an ordered list of time slots plus the list of tracks
//! (rooms) that run in parallel. It is loaded once at startup and never
//! mutated afterwards.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, WallError};

fn default_kind() -> String {
    "session".to_string()
}

/// One schedule entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Local wall-clock start of the slot
    pub start: NaiveDateTime,

    /// Local wall-clock end of the slot
    pub end: NaiveDateTime,

    /// Slot type (e.g. "session", "fixed", "break")
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    /// Remaining session metadata, passed through to viewers untouched
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Slot {
    /// Create a slot with no extra metadata
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, kind: impl Into<String>) -> Self {
        Self {
            start,
            end,
            kind: kind.into(),
            details: Map::new(),
        }
    }

    /// Attach a metadata field
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// The full event schedule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Parallel tracks, sent to viewers alongside the current slot
    #[serde(default)]
    pub tracks: Vec<Value>,

    /// Slots in chronological order
    #[serde(default)]
    pub slots: Vec<Slot>,
}

impl Schedule {
    /// Create a schedule from slots and tracks
    pub fn new(slots: Vec<Slot>, tracks: Vec<Value>) -> Self {
        Self { tracks, slots }
    }

    /// Parse and validate a schedule document
    pub fn from_json(json: &str) -> Result<Self> {
        let schedule: Schedule = serde_json::from_str(json)?;
        schedule.validate()?;
        Ok(schedule)
    }

    /// Read, parse and validate a schedule file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            WallError::Config(format!("cannot read schedule {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Check that every slot ends after it starts and slots are in order
    pub fn validate(&self) -> Result<()> {
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.start >= slot.end {
                return Err(WallError::Config(format!(
                    "slot {} ends before it starts ({} >= {})",
                    i, slot.start, slot.end
                )));
            }
        }

        for (i, pair) in self.slots.windows(2).enumerate() {
            if pair[1].start < pair[0].start {
                return Err(WallError::Config(format!(
                    "slot {} starts before slot {}",
                    i + 1,
                    i
                )));
            }
        }

        Ok(())
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the schedule has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
