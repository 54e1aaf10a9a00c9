//! Nullable store: thread-safe in-memory maps for testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mapkeeper_store::{
    describe_key, MapBackend, OrderedMap, Record, RecordScan, RetryPolicy, ScanOrder, ScanRange,
    StoreError,
};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Injected failures shared by the backend and every map it hands out.
#[derive(Default)]
struct Faults {
    pending_contention: AtomicU32,
    pending_drop_failures: AtomicU32,
    injected: AtomicU64,
}

impl Faults {
    /// Consume one pending contention failure, if any.
    fn contend(&self, op: &str) -> Result<(), StoreError> {
        let hit = self
            .pending_contention
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hit {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Contention(format!("injected contention in {op}")));
        }
        Ok(())
    }

    fn fail_drop(&self, map: &str) -> Result<(), StoreError> {
        let hit = self
            .pending_drop_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hit {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Backend(format!("injected failure dropping map '{map}'")));
        }
        Ok(())
    }
}

/// An in-memory map backend for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullBackend {
    maps: Mutex<BTreeMap<String, Arc<Mutex<Tree>>>>,
    faults: Arc<Faults>,
    retry: RetryPolicy,
    checkpoints: AtomicU64,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::with_retry(RetryPolicy::default())
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self {
            maps: Mutex::new(BTreeMap::new()),
            faults: Arc::new(Faults::default()),
            retry,
            checkpoints: AtomicU64::new(0),
        }
    }

    /// Make the next `n` storage attempts, on any map, fail with contention.
    pub fn fail_next(&self, n: u32) {
        self.faults.pending_contention.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` map drops fail with a backend error, leaving the
    /// map and its records in place.
    pub fn fail_next_drop(&self, n: u32) {
        self.faults.pending_drop_failures.store(n, Ordering::SeqCst);
    }

    /// Failures injected so far.
    pub fn injected_failures(&self) -> u64 {
        self.faults.injected.load(Ordering::SeqCst)
    }

    /// Number of completed checkpoints.
    pub fn checkpoints(&self) -> u64 {
        self.checkpoints.load(Ordering::SeqCst)
    }

    fn handle(&self, name: &str, data: Arc<Mutex<Tree>>) -> NullMap {
        NullMap {
            name: name.to_string(),
            data,
            faults: Arc::clone(&self.faults),
            retry: self.retry,
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MapBackend for NullBackend {
    type Map = NullMap;

    fn create_map(&self, name: &str) -> Result<NullMap, StoreError> {
        let mut maps = lock(&self.maps);
        if maps.contains_key(name) {
            return Err(StoreError::AlreadyExists(format!("map '{name}'")));
        }
        let data = Arc::new(Mutex::new(Tree::new()));
        maps.insert(name.to_string(), Arc::clone(&data));
        Ok(self.handle(name, data))
    }

    fn open_map(&self, name: &str) -> Result<NullMap, StoreError> {
        let maps = lock(&self.maps);
        let data = maps
            .get(name)
            .ok_or_else(|| StoreError::NotFound(format!("map '{name}'")))?;
        Ok(self.handle(name, Arc::clone(data)))
    }

    fn drop_map(&self, map: &mut NullMap) -> Result<(), StoreError> {
        self.faults.fail_drop(&map.name)?;
        lock(&map.data).clear();
        lock(&self.maps).remove(&map.name);
        tracing::debug!(map = %map.name, "dropped in-memory map");
        Ok(())
    }

    fn close_map(&self, _map: NullMap) -> Result<(), StoreError> {
        Ok(())
    }

    fn list_maps(&self) -> Result<Vec<String>, StoreError> {
        Ok(lock(&self.maps).keys().cloned().collect())
    }

    fn checkpoint(&self) -> Result<(), StoreError> {
        self.checkpoints.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Handle on one in-memory map. Handles opened on the same name share data.
pub struct NullMap {
    name: String,
    data: Arc<Mutex<Tree>>,
    faults: Arc<Faults>,
    retry: RetryPolicy,
}

impl NullMap {
    fn attempt<T>(
        &self,
        op: &'static str,
        mut f: impl FnMut(&mut Tree) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.retry.run(op, || {
            self.faults.contend(op)?;
            let mut tree = lock(&self.data);
            f(&mut *tree)
        })
    }
}

fn not_found(key: &[u8]) -> StoreError {
    StoreError::NotFound(format!("record {}", describe_key(key)))
}

impl OrderedMap for NullMap {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.attempt("get", |tree| tree.get(key).cloned().ok_or_else(|| not_found(key)))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.attempt("put", |tree| {
            tree.insert(key.to_vec(), value.to_vec());
            Ok(())
        })
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.attempt("insert", |tree| {
            if tree.contains_key(key) {
                return Err(StoreError::AlreadyExists(format!(
                    "record {}",
                    describe_key(key)
                )));
            }
            tree.insert(key.to_vec(), value.to_vec());
            Ok(())
        })
    }

    fn update(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.attempt("update", |tree| match tree.get_mut(key) {
            Some(slot) => {
                *slot = value.to_vec();
                Ok(())
            }
            None => Err(not_found(key)),
        })
    }

    fn remove(&self, key: &[u8]) -> Result<(), StoreError> {
        self.attempt("remove", |tree| {
            tree.remove(key).map(|_| ()).ok_or_else(|| not_found(key))
        })
    }

    fn len(&self) -> Result<u64, StoreError> {
        Ok(lock(&self.data).len() as u64)
    }

    /// Copies the qualifying records up front, so the scan sees a snapshot
    /// and holds no lock while it is pulled.
    fn scan(&self, range: &ScanRange) -> Result<RecordScan<'_>, StoreError> {
        let mut records = self.attempt("scan", |tree| {
            Ok(tree
                .iter()
                .filter(|(k, _)| range.contains(k))
                .map(|(k, v)| Record::new(k.as_slice(), v.as_slice()))
                .collect::<Vec<_>>())
        })?;
        if range.order == ScanOrder::Descending {
            records.reverse();
        }
        Ok(Box::new(records.into_iter().map(Ok)))
    }
}
