//! Current-session computation
//!
//! `SessionClock::compute` maps a wall-clock instant onto the schedule. It is
//! a pure function of its inputs: no I/O, no hidden state, and it never fails.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, Timelike};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::slot::{Schedule, Slot};

/// Which part of the day we are in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Before the first slot starts
    Before,
    /// Inside one of the slots
    InSession,
    /// After the last slot ends
    After,
}

/// Snapshot of the current session, as sent to viewers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum SessionView {
    /// The event has not started yet
    Before { announcement: String },
    /// A slot is running
    InSession {
        index: usize,
        slot: Slot,
        tracks: Vec<Value>,
    },
    /// The event is over
    After { announcement: String },
}

impl SessionView {
    /// Get the phase of this view
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionView::Before { .. } => SessionPhase::Before,
            SessionView::InSession { .. } => SessionPhase::InSession,
            SessionView::After { .. } => SessionPhase::After,
        }
    }

    /// Index of the running slot, if any
    pub fn slot_index(&self) -> Option<usize> {
        match self {
            SessionView::InSession { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Fixed texts shown outside the scheduled slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Announcements {
    /// Shown before the first slot
    pub before: String,
    /// Shown after the last slot
    pub after: String,
}

impl Default for Announcements {
    fn default() -> Self {
        Self {
            before: "The event has not started yet, hope to see you there!".to_string(),
            after: "The event is over. Thanks for coming by.".to_string(),
        }
    }
}

/// Maps wall-clock time onto a schedule
#[derive(Debug, Clone)]
pub struct SessionClock {
    schedule: Arc<Schedule>,
    announcements: Announcements,
}

impl SessionClock {
    /// Create a clock over a schedule
    pub fn new(schedule: Arc<Schedule>, announcements: Announcements) -> Self {
        Self {
            schedule,
            announcements,
        }
    }

    /// Get the schedule
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Compute the current session view for `now`
    ///
    /// Slots are scanned in order against their start boundary at minute
    /// granularity. The scan index never exceeds the slot count, so any
    /// instant at or past the last slot's end resolves to `After`.
    pub fn compute(&self, now: NaiveDateTime) -> SessionView {
        let slots = &self.schedule.slots;
        let now = truncate_to_minute(now);

        let mut index = 0;
        while index < slots.len() && truncate_to_minute(slots[index].start) <= now {
            index += 1;
        }

        if index == 0 {
            return SessionView::Before {
                announcement: self.announcements.before.clone(),
            };
        }

        let last = &slots[slots.len() - 1];
        if now >= truncate_to_minute(last.end) {
            return SessionView::After {
                announcement: self.announcements.after.clone(),
            };
        }

        SessionView::InSession {
            index: index - 1,
            slot: slots[index - 1].clone(),
            tracks: self.schedule.tracks.clone(),
        }
    }
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// Source of "now" for the session clock
pub trait WallClock: Send + Sync {
    /// Current local wall-clock time
    fn now(&self) -> NaiveDateTime;
}

/// The system's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    /// Create a clock frozen at `now`
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock
    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }
}

impl WallClock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        format!("2013-03-02T{}", s).parse().unwrap()
    }

    fn two_slot_clock() -> SessionClock {
        let schedule = Schedule::new(
            vec![
                Slot::new(at("08:00:00"), at("09:00:00"), "fixed"),
                Slot::new(at("09:00:00"), at("10:00:00"), "session"),
            ],
            vec![Value::from("Hall A")],
        );
        SessionClock::new(Arc::new(schedule), Announcements::default())
    }

    #[test]
    fn test_phases() {
        let clock = two_slot_clock();

        assert_eq!(clock.compute(at("07:30:00")).phase(), SessionPhase::Before);

        let view = clock.compute(at("08:30:00"));
        assert_eq!(view.phase(), SessionPhase::InSession);
        assert_eq!(view.slot_index(), Some(0));

        assert_eq!(clock.compute(at("09:15:00")).slot_index(), Some(1));
        assert_eq!(clock.compute(at("10:30:00")).phase(), SessionPhase::After);
    }

    #[test]
    fn test_minute_granularity() {
        let clock = two_slot_clock();

        // Seconds inside the start minute already count as started
        assert_eq!(clock.compute(at("08:00:00")).slot_index(), Some(0));
        assert_eq!(clock.compute(at("08:59:59")).slot_index(), Some(0));
        assert_eq!(clock.compute(at("09:00:30")).slot_index(), Some(1));
        assert_eq!(clock.compute(at("07:59:59")).phase(), SessionPhase::Before);

        // The end minute of the last slot is already "after"
        assert_eq!(clock.compute(at("10:00:00")).phase(), SessionPhase::After);
        assert_eq!(clock.compute(at("09:59:59")).slot_index(), Some(1));
    }

    #[test]
    fn test_in_session_carries_slot_and_tracks() {
        let clock = two_slot_clock();

        match clock.compute(at("08:10:00")) {
            SessionView::InSession {
                index,
                slot,
                tracks,
            } => {
                assert_eq!(index, 0);
                assert_eq!(slot.kind, "fixed");
                assert_eq!(tracks, vec![Value::from("Hall A")]);
            }
            other => panic!("unexpected view: {:?}", other),
        }
    }

    #[test]
    fn test_compute_is_pure() {
        let clock = two_slot_clock();
        let now = at("08:45:12");

        assert_eq!(clock.compute(now), clock.compute(now));
    }

    #[test]
    fn test_extreme_instants() {
        let clock = two_slot_clock();

        assert_eq!(
            clock.compute(NaiveDateTime::MIN).phase(),
            SessionPhase::Before
        );
        assert_eq!(clock.compute(NaiveDateTime::MAX).phase(), SessionPhase::After);
    }

    #[test]
    fn test_empty_schedule() {
        let clock = SessionClock::new(Arc::new(Schedule::default()), Announcements::default());

        assert_eq!(clock.compute(at("12:00:00")).phase(), SessionPhase::Before);
    }

    #[test]
    fn test_view_serialization() {
        let clock = two_slot_clock();

        let json = serde_json::to_value(clock.compute(at("07:00:00"))).unwrap();
        assert_eq!(json["phase"], "before");
        assert!(json["announcement"].is_string());

        let json = serde_json::to_value(clock.compute(at("08:30:00"))).unwrap();
        assert_eq!(json["phase"], "in-session");
        assert_eq!(json["index"], 0);
        assert_eq!(json["slot"]["type"], "fixed");
        assert_eq!(json["tracks"][0], "Hall A");
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(at("08:00:00"));
        assert_eq!(clock.now(), at("08:00:00"));

        clock.set(at("09:30:00"));
        assert_eq!(clock.now(), at("09:30:00"));
    }
}
