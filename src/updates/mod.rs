//! Wall updates posted by the organizers

pub mod log;

pub use log::{UpdateLog, UpdatesConfig};
