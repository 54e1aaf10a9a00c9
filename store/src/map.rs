//! Ordered map and backend traits.
//!
//! Every storage engine (LMDB, in-memory for testing) implements these
//! traits. The registry and the RPC service depend only on them.

use crate::scan::{RecordScan, ScanRange};
use crate::StoreError;

/// One named ordered key-value collection.
pub trait OrderedMap: Send + Sync {
    /// Name the map was created or opened under.
    fn name(&self) -> &str;

    /// Read the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Store a new record. Fails with [`StoreError::AlreadyExists`] and
    /// leaves the stored value untouched if `key` is present.
    fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Overwrite an existing record. Fails with [`StoreError::NotFound`] and
    /// creates nothing if `key` is absent.
    fn update(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Delete a record. Fails with [`StoreError::NotFound`] if absent.
    fn remove(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Number of records.
    fn len(&self) -> Result<u64, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|n| n == 0)
    }

    /// Start a range scan. The returned scanner holds engine resources until
    /// it is dropped.
    fn scan(&self, range: &ScanRange) -> Result<RecordScan<'_>, StoreError>;
}

/// A storage engine hosting any number of named maps.
pub trait MapBackend: Send + Sync + 'static {
    type Map: OrderedMap + 'static;

    /// Create a new map. Fails with [`StoreError::AlreadyExists`] if a map
    /// with this name exists.
    fn create_map(&self, name: &str) -> Result<Self::Map, StoreError>;

    /// Open an existing map. Fails with [`StoreError::NotFound`] if absent.
    fn open_map(&self, name: &str) -> Result<Self::Map, StoreError>;

    /// Delete all of `map`'s records and forget its name, leaving the handle
    /// closed. On failure the map and its handle are left as they were.
    fn drop_map(&self, map: &mut Self::Map) -> Result<(), StoreError>;

    /// Close `map`, keeping its records.
    fn close_map(&self, map: Self::Map) -> Result<(), StoreError>;

    /// Names of all persisted maps, ascending.
    fn list_maps(&self) -> Result<Vec<String>, StoreError>;

    /// Make committed writes durable and reclaim engine resources.
    fn checkpoint(&self) -> Result<(), StoreError>;
}
