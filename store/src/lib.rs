//! Abstract storage traits for MapKeeper.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits, the scan
//! bound rules and the shared retry policy defined here.

pub mod error;
pub mod map;
pub mod retry;
pub mod scan;

pub use error::{describe_key, StoreError};
pub use map::{MapBackend, OrderedMap};
pub use retry::{RetryPolicy, DEFAULT_RETRY_BUDGET};
pub use scan::{
    collect_scan, compare_keys, Record, RecordScan, ScanLimits, ScanOrder, ScanOutcome,
    ScanRange, ScanStatus,
};
