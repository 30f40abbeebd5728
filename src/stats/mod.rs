//! Wall statistics

pub mod metrics;

pub use metrics::{WallMetrics, WallStats};
