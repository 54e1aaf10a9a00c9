//! LMDB storage backend for MapKeeper.
//!
//! Implements the `mapkeeper-store` traits using the `heed` LMDB bindings.
//! Every map is one named LMDB database inside a single environment, and a
//! catalog database records which maps exist.

pub mod backend;
pub mod catalog;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod iterator;
pub mod store;

pub use backend::LmdbBackend;
pub use environment::{Environment, EnvironmentConfig};
pub use error::LmdbError;
pub use integrity::{check_integrity, IntegrityReport};
pub use iterator::LmdbRangeScanner;
pub use store::LmdbStore;
