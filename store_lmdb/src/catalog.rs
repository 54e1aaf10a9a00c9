//! Persistent list of live maps.
//!
//! Each map's records live in an LMDB database named `mapkeeper_<name>`. The
//! catalog database maps every live map name to a bincode-encoded
//! [`MapInfo`]. LMDB cannot delete a named database through heed, so
//! dropping a map clears its records and removes its catalog entry; the
//! catalog, not the set of named databases, decides which maps exist.

use std::time::{SystemTime, UNIX_EPOCH};

use heed::types::Bytes;
use heed::{Database, Env, RoTxn, RwTxn};
use serde::{Deserialize, Serialize};

use crate::LmdbError;

/// Prefix of every data database name.
pub const DATA_DB_PREFIX: &str = "mapkeeper_";

/// Name of the catalog database. Map names are never prefixed with it.
pub const CATALOG_DB_NAME: &str = "__mapkeeper_catalog";

/// LMDB database name holding the records of `map_name`.
pub fn data_db_name(map_name: &str) -> String {
    format!("{DATA_DB_PREFIX}{map_name}")
}

/// Metadata kept per map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapInfo {
    pub created_at_secs: u64,
}

impl MapInfo {
    pub fn now() -> Self {
        let created_at_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self { created_at_secs }
    }
}

#[derive(Clone, Copy)]
pub struct Catalog {
    db: Database<Bytes, Bytes>,
}

impl Catalog {
    /// Open the catalog database, creating it on first use.
    pub fn open(env: &Env) -> Result<Self, LmdbError> {
        let mut wtxn = env.write_txn()?;
        let db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(CATALOG_DB_NAME))?;
        wtxn.commit()?;
        Ok(Self { db })
    }

    pub fn get(&self, txn: &RoTxn, name: &str) -> Result<Option<MapInfo>, LmdbError> {
        match self.db.get(txn, name.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, txn: &RoTxn, name: &str) -> Result<bool, LmdbError> {
        Ok(self.db.get(txn, name.as_bytes())?.is_some())
    }

    pub fn insert(&self, txn: &mut RwTxn, name: &str, info: &MapInfo) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(info)?;
        self.db.put(txn, name.as_bytes(), &bytes)?;
        Ok(())
    }

    /// Returns `false` if `name` was not catalogued.
    pub fn remove(&self, txn: &mut RwTxn, name: &str) -> Result<bool, LmdbError> {
        Ok(self.db.delete(txn, name.as_bytes())?)
    }

    /// Catalogued map names, ascending.
    pub fn names(&self, txn: &RoTxn) -> Result<Vec<String>, LmdbError> {
        let mut names = Vec::new();
        for entry in self.db.iter(txn)? {
            let (key, _) = entry?;
            let name = std::str::from_utf8(key)
                .map_err(|e| LmdbError::Serialization(format!("catalog key: {e}")))?;
            names.push(name.to_string());
        }
        Ok(names)
    }
}
