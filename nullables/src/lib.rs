//! Nullable infrastructure for deterministic testing.
//!
//! Provides an in-memory [`MapBackend`](mapkeeper_store::MapBackend) that:
//! - never touches the filesystem;
//! - can be told to fail the next N attempts with contention, so retry
//!   behavior is testable without real lock races;
//! - counts checkpoints for scheduler tests.
//!
//! Usage: swap `LmdbBackend` for `NullBackend` in tests, or run the daemon
//! with `--backend memory`.

pub mod store;

pub use store::{NullBackend, NullMap};
