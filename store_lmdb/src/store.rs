//! LMDB implementation of a single named map.
//!
//! A store moves through `Uninitialized -> Open -> Closed`. Only an open
//! store serves requests; a closed store cannot be reopened, create a new
//! one instead.
//!
//! Point operations run inside the store's [`RetryPolicy`], so a contended
//! attempt is repeated while a definitive outcome (success, not found,
//! already exists) or an unexpected error returns at once.

use std::ops::Bound;

use heed::types::Bytes;
use heed::{Database, Env};

use mapkeeper_store::{
    describe_key, OrderedMap, RecordScan, RetryPolicy, ScanRange, StoreError,
};

use crate::catalog::{data_db_name, Catalog, MapInfo};
use crate::iterator::LmdbRangeScanner;
use crate::{Environment, LmdbError};

struct OpenStore {
    env: Env,
    catalog: Catalog,
    db: Database<Bytes, Bytes>,
}

enum StoreState {
    Uninitialized,
    Open(OpenStore),
    Closed,
}

pub struct LmdbStore {
    name: String,
    state: StoreState,
    retry: RetryPolicy,
}

impl LmdbStore {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            name: String::new(),
            state: StoreState::Uninitialized,
            retry,
        }
    }

    /// Create a new map called `name`.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if the map exists.
    pub fn create(&mut self, env: &Environment, name: &str) -> Result<(), StoreError> {
        self.ensure_uninitialized(name)?;
        let heed_env = env.env()?.clone();
        let catalog = env.catalog()?;

        let mut wtxn = heed_env.write_txn().map_err(LmdbError::from)?;
        if catalog.contains(&wtxn, name)? {
            return Err(StoreError::AlreadyExists(format!("map '{name}'")));
        }
        let db = heed_env
            .create_database::<Bytes, Bytes>(&mut wtxn, Some(data_db_name(name).as_str()))
            .map_err(LmdbError::from)?;
        // A map dropped earlier leaves an empty database behind; make sure
        // nothing from a half-finished drop survives.
        db.clear(&mut wtxn).map_err(LmdbError::from)?;
        catalog.insert(&mut wtxn, name, &MapInfo::now())?;
        wtxn.commit().map_err(LmdbError::from)?;

        tracing::info!(map = name, "created map");
        self.name = name.to_string();
        self.state = StoreState::Open(OpenStore {
            env: heed_env,
            catalog,
            db,
        });
        Ok(())
    }

    /// Open the existing map called `name`.
    ///
    /// Fails with [`StoreError::NotFound`] if it does not exist.
    pub fn open(&mut self, env: &Environment, name: &str) -> Result<(), StoreError> {
        self.ensure_uninitialized(name)?;
        let heed_env = env.env()?.clone();
        let catalog = env.catalog()?;

        // Opened under a write transaction so the handle outlives it.
        let wtxn = heed_env.write_txn().map_err(LmdbError::from)?;
        if !catalog.contains(&wtxn, name)? {
            return Err(StoreError::NotFound(format!("map '{name}'")));
        }
        let db = heed_env
            .open_database::<Bytes, Bytes>(&wtxn, Some(data_db_name(name).as_str()))
            .map_err(LmdbError::from)?
            .ok_or_else(|| {
                StoreError::Corruption(format!("map '{name}' is catalogued but has no database"))
            })?;
        wtxn.commit().map_err(LmdbError::from)?;

        tracing::debug!(map = name, "opened map");
        self.name = name.to_string();
        self.state = StoreState::Open(OpenStore {
            env: heed_env,
            catalog,
            db,
        });
        Ok(())
    }

    /// Stop serving requests. Records stay on disk.
    pub fn close(&mut self) -> Result<(), StoreError> {
        self.take_open()?;
        tracing::debug!(map = %self.name, "closed map");
        Ok(())
    }

    /// Delete every record and the catalog entry, then close the store.
    /// The store stays open if the delete does not commit.
    pub fn drop_store(&mut self) -> Result<(), StoreError> {
        let open = self.open_store()?;
        let mut wtxn = open.env.write_txn().map_err(LmdbError::from)?;
        open.db.clear(&mut wtxn).map_err(LmdbError::from)?;
        open.catalog.remove(&mut wtxn, &self.name)?;
        wtxn.commit().map_err(LmdbError::from)?;
        self.state = StoreState::Closed;
        tracing::info!(map = %self.name, "dropped map");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, StoreState::Open(_))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        let open = self.open_store()?;
        self.retry.run("get", || open.get(key))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let open = self.open_store()?;
        self.retry.run("put", || open.put(key, value))
    }

    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let open = self.open_store()?;
        self.retry.run("insert", || open.insert(key, value))
    }

    pub fn update(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let open = self.open_store()?;
        self.retry.run("update", || open.update(key, value))
    }

    pub fn remove(&self, key: &[u8]) -> Result<(), StoreError> {
        let open = self.open_store()?;
        self.retry.run("remove", || open.remove(key))
    }

    pub fn len(&self) -> Result<u64, StoreError> {
        let open = self.open_store()?;
        self.retry.run("len", || open.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|n| n == 0)
    }

    /// Start a range scan. The scanner holds a reader slot until it ends or
    /// is dropped.
    pub fn scan(&self, range: &ScanRange) -> Result<LmdbRangeScanner<'_>, StoreError> {
        let open = self.open_store()?;
        self.retry.run("scan", || {
            LmdbRangeScanner::init(&open.env, open.db, range.clone()).map_err(StoreError::from)
        })
    }

    fn ensure_uninitialized(&self, name: &str) -> Result<(), StoreError> {
        match self.state {
            StoreState::Uninitialized => Ok(()),
            StoreState::Open(_) => Err(StoreError::InvalidState(format!(
                "cannot open '{name}': store already holds map '{}'",
                self.name
            ))),
            StoreState::Closed => Err(StoreError::InvalidState(format!(
                "cannot open '{name}': store for map '{}' is closed",
                self.name
            ))),
        }
    }

    fn open_store(&self) -> Result<&OpenStore, StoreError> {
        match &self.state {
            StoreState::Open(open) => Ok(open),
            _ => Err(self.not_open()),
        }
    }

    fn take_open(&mut self) -> Result<OpenStore, StoreError> {
        match std::mem::replace(&mut self.state, StoreState::Closed) {
            StoreState::Open(open) => Ok(open),
            other => {
                self.state = other;
                Err(self.not_open())
            }
        }
    }

    fn not_open(&self) -> StoreError {
        match self.state {
            StoreState::Closed => StoreError::InvalidState(format!("map '{}' is closed", self.name)),
            _ => StoreError::InvalidState("store is not initialized".to_string()),
        }
    }
}

impl OpenStore {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        self.db
            .get(&rtxn, key)
            .map_err(LmdbError::from)?
            .map(<[u8]>::to_vec)
            .ok_or_else(|| StoreError::NotFound(format!("record {}", describe_key(key))))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.db
            .put(&mut wtxn, key, value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        // The write transaction is exclusive, so check-then-put is atomic.
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self.db.get(&wtxn, key).map_err(LmdbError::from)?.is_some() {
            return Err(StoreError::AlreadyExists(format!(
                "record {}",
                describe_key(key)
            )));
        }
        self.db
            .put(&mut wtxn, key, value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    /// Position a write cursor on `key` and overwrite the value in place.
    ///
    /// The cursor borrows the transaction, so it is always closed before the
    /// transaction commits or aborts.
    fn update(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        {
            let bounds = (Bound::Included(key), Bound::Included(key));
            let mut cursor = self
                .db
                .range_mut(&mut wtxn, &bounds)
                .map_err(LmdbError::from)?;
            match cursor.next() {
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(LmdbError::from(e).into()),
                None => {
                    return Err(StoreError::NotFound(format!(
                        "record {}",
                        describe_key(key)
                    )))
                }
            }
            // SAFETY: no borrow from the database outlives this write.
            unsafe { cursor.put_current(key, value) }.map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let deleted = self
            .db
            .delete(&mut wtxn, key)
            .map_err(LmdbError::from)?;
        if !deleted {
            return Err(StoreError::NotFound(format!("record {}", describe_key(key))));
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn len(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.db.len(&rtxn).map_err(LmdbError::from)?)
    }
}

impl OrderedMap for LmdbStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        LmdbStore::get(self, key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        LmdbStore::put(self, key, value)
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        LmdbStore::insert(self, key, value)
    }

    fn update(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        LmdbStore::update(self, key, value)
    }

    fn remove(&self, key: &[u8]) -> Result<(), StoreError> {
        LmdbStore::remove(self, key)
    }

    fn len(&self) -> Result<u64, StoreError> {
        LmdbStore::len(self)
    }

    fn scan(&self, range: &ScanRange) -> Result<RecordScan<'_>, StoreError> {
        Ok(Box::new(LmdbStore::scan(self, range)?))
    }
}
