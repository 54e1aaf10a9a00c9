//! Shared utilities for MapKeeper.

pub mod logging;
pub mod stats;

pub use logging::{init_logging, LogFormat, LoggingError};
pub use stats::{OpSnapshot, OpStats, StatsSnapshot, OPERATIONS};
