//! Map service: the operations exposed to clients, with wire response codes.
//!
//! Every operation answers with a [`ResponseCode`]. Definitive outcomes get
//! their own code; anything unexpected is logged and reported as
//! [`ResponseCode::Error`].

use std::sync::Arc;

use mapkeeper_store::{
    collect_scan, MapBackend, OrderedMap, Record, ScanLimits, ScanRange, ScanStatus, StoreError,
};
use mapkeeper_utils::{OpStats, StatsSnapshot};
use serde::{Deserialize, Serialize};

use crate::registry::{MapRegistry, RegistryError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCode {
    Success,
    Error,
    MapNotFound,
    MapExists,
    RecordNotFound,
    RecordExists,
    ScanEnded,
}

impl ResponseCode {
    fn is_error(self) -> bool {
        self == ResponseCode::Error
    }
}

impl From<&RegistryError> for ResponseCode {
    fn from(e: &RegistryError) -> Self {
        match e {
            RegistryError::MapNotFound(_) => ResponseCode::MapNotFound,
            RegistryError::MapExists(_) => ResponseCode::MapExists,
            RegistryError::Store(StoreError::NotFound(_)) => ResponseCode::RecordNotFound,
            RegistryError::Store(StoreError::AlreadyExists(_)) => ResponseCode::RecordExists,
            RegistryError::Store(_) => ResponseCode::Error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetResult {
    pub code: ResponseCode,
    pub value: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanResult {
    pub code: ResponseCode,
    pub records: Vec<Record>,
}

pub struct MapService<B: MapBackend> {
    registry: MapRegistry<B>,
    stats: OpStats,
}

impl<B: MapBackend> MapService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            registry: MapRegistry::new(backend),
            stats: OpStats::default(),
        }
    }

    /// Open every persisted map.
    pub fn load(&self) -> Result<usize, StoreError> {
        self.registry.load()
    }

    pub fn registry(&self) -> &MapRegistry<B> {
        &self.registry
    }

    pub fn ping(&self) -> ResponseCode {
        self.finish("ping", Ok(()))
    }

    pub fn add_map(&self, name: &str) -> ResponseCode {
        let result = self.registry.add_map(name);
        if result.is_ok() {
            tracing::info!(map = name, "map added");
        }
        self.finish("add_map", result)
    }

    pub fn drop_map(&self, name: &str) -> ResponseCode {
        let result = self.registry.drop_map(name);
        if result.is_ok() {
            tracing::info!(map = name, "map dropped");
        }
        self.finish("drop_map", result)
    }

    pub fn list_maps(&self) -> (ResponseCode, Vec<String>) {
        let names = self.registry.names();
        (self.finish("list_maps", Ok(())), names)
    }

    pub fn get(&self, map: &str, key: &[u8]) -> GetResult {
        match self.registry.with_map(map, |m| m.get(key)) {
            Ok(value) => GetResult {
                code: self.finish("get", Ok(())),
                value: Some(value),
            },
            Err(e) => GetResult {
                code: self.finish::<()>("get", Err(e)),
                value: None,
            },
        }
    }

    pub fn put(&self, map: &str, key: &[u8], value: &[u8]) -> ResponseCode {
        let result = self.registry.with_map(map, |m| m.put(key, value));
        self.finish("put", result)
    }

    pub fn insert(&self, map: &str, key: &[u8], value: &[u8]) -> ResponseCode {
        let result = self.registry.with_map(map, |m| m.insert(key, value));
        self.finish("insert", result)
    }

    pub fn update(&self, map: &str, key: &[u8], value: &[u8]) -> ResponseCode {
        let result = self.registry.with_map(map, |m| m.update(key, value));
        self.finish("update", result)
    }

    pub fn remove(&self, map: &str, key: &[u8]) -> ResponseCode {
        let result = self.registry.with_map(map, |m| m.remove(key));
        self.finish("remove", result)
    }

    /// Scan `range` in `map`, stopping at `limits`.
    ///
    /// `ScanEnded` means the range was exhausted. `Success` means a limit
    /// stopped the scan and more records may remain.
    pub fn scan(&self, map: &str, range: &ScanRange, limits: ScanLimits) -> ScanResult {
        let result = self
            .registry
            .with_map(map, |m| collect_scan(m.scan(range)?, limits));
        match result {
            Ok(outcome) => {
                let code = match outcome.status {
                    ScanStatus::Ended => ResponseCode::ScanEnded,
                    ScanStatus::LimitReached => ResponseCode::Success,
                };
                self.stats.record("scan", false);
                ScanResult {
                    code,
                    records: outcome.records,
                }
            }
            Err(e) => ScanResult {
                code: self.finish::<()>("scan", Err(e)),
                records: Vec::new(),
            },
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.record("stats", false);
        self.stats.snapshot()
    }

    fn finish<T>(&self, op: &'static str, result: Result<T, RegistryError>) -> ResponseCode {
        let code = match &result {
            Ok(_) => ResponseCode::Success,
            Err(e) => ResponseCode::from(e),
        };
        if let Err(e) = &result {
            if code.is_error() {
                tracing::error!(op, error = %e, "operation failed");
            } else {
                tracing::debug!(op, error = %e, "operation declined");
            }
        }
        self.stats.record(op, code.is_error());
        code
    }
}
