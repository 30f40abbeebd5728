//! Event schedule and the current-session clock
//!
//! The schedule is read once at startup. The session clock derives a
//! [`SessionView`] from it on demand; views are never stored, only recomputed
//! by the periodic session tick and on every viewer registration.

pub mod clock;
pub mod slot;

pub use clock::{Announcements, FixedClock, SessionClock, SessionPhase, SessionView, SystemClock, WallClock};
pub use slot::{Schedule, Slot};
