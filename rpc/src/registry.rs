//! Name → open map registry shared by all request handlers.
//!
//! Point operations and scans take the read lock for as long as they use a
//! map; adding or dropping a whole map takes the write lock.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use mapkeeper_store::{MapBackend, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("map not found: {0}")]
    MapNotFound(String),

    #[error("map already exists: {0}")]
    MapExists(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct MapRegistry<B: MapBackend> {
    backend: Arc<B>,
    maps: RwLock<HashMap<String, B::Map>>,
}

impl<B: MapBackend> MapRegistry<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            maps: RwLock::new(HashMap::new()),
        }
    }

    /// Open every map the backend knows about. Returns how many were opened.
    pub fn load(&self) -> Result<usize, StoreError> {
        let names = self.backend.list_maps()?;
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        for name in names {
            if maps.contains_key(&name) {
                continue;
            }
            let map = self.backend.open_map(&name)?;
            maps.insert(name, map);
        }
        tracing::info!(maps = maps.len(), "map registry loaded");
        Ok(maps.len())
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn add_map(&self, name: &str) -> Result<(), RegistryError> {
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        if maps.contains_key(name) {
            return Err(RegistryError::MapExists(name.to_string()));
        }
        let map = self.backend.create_map(name).map_err(|e| match e {
            StoreError::AlreadyExists(_) => RegistryError::MapExists(name.to_string()),
            other => other.into(),
        })?;
        maps.insert(name.to_string(), map);
        Ok(())
    }

    /// Drop the map called `name`. It stays registered if the backend
    /// fails to drop it.
    pub fn drop_map(&self, name: &str) -> Result<(), RegistryError> {
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        let map = maps
            .get_mut(name)
            .ok_or_else(|| RegistryError::MapNotFound(name.to_string()))?;
        self.backend.drop_map(map)?;
        maps.remove(name);
        Ok(())
    }

    /// Run `f` against the map called `name` under the read lock.
    pub fn with_map<T, F>(&self, name: &str, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&B::Map) -> Result<T, StoreError>,
    {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        let map = maps
            .get(name)
            .ok_or_else(|| RegistryError::MapNotFound(name.to_string()))?;
        Ok(f(map)?)
    }

    /// Registered map names, ascending.
    pub fn names(&self) -> Vec<String> {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = maps.keys().cloned().collect();
        names.sort();
        names
    }

    /// Close every registered map, keeping their records. Used at shutdown.
    pub fn close_all(&self) -> Result<(), StoreError> {
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        let mut first_error = None;
        for (name, map) in maps.drain() {
            if let Err(e) = self.backend.close_map(map) {
                tracing::warn!(map = %name, error = %e, "failed to close map");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapkeeper_nullables::NullBackend;
    use mapkeeper_store::OrderedMap;

    fn registry() -> MapRegistry<NullBackend> {
        MapRegistry::new(Arc::new(NullBackend::new()))
    }

    #[test]
    fn add_existing_map_is_map_exists() {
        let registry = registry();
        registry.add_map("db1").unwrap();
        assert!(matches!(
            registry.add_map("db1"),
            Err(RegistryError::MapExists(_))
        ));
    }

    #[test]
    fn missing_map_is_map_not_found() {
        let registry = registry();
        assert!(matches!(
            registry.with_map("nope", |m| m.len()),
            Err(RegistryError::MapNotFound(_))
        ));
        assert!(matches!(
            registry.drop_map("nope"),
            Err(RegistryError::MapNotFound(_))
        ));
    }

    #[test]
    fn record_errors_pass_through() {
        let registry = registry();
        registry.add_map("db1").unwrap();
        assert!(matches!(
            registry.with_map("db1", |m| m.get(b"k")),
            Err(RegistryError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn load_opens_backend_maps() {
        let backend = Arc::new(NullBackend::new());
        backend.create_map("b").unwrap();
        backend.create_map("a").unwrap();
        let registry = MapRegistry::new(Arc::clone(&backend));
        assert_eq!(registry.load().unwrap(), 2);
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn close_all_empties_the_registry() {
        let registry = registry();
        registry.add_map("db1").unwrap();
        registry.close_all().unwrap();
        assert!(registry.names().is_empty());
        assert_eq!(registry.backend().list_maps().unwrap(), vec!["db1"]);
    }

    #[test]
    fn failed_drop_leaves_map_registered() {
        let backend = Arc::new(NullBackend::new());
        let registry = MapRegistry::new(Arc::clone(&backend));
        registry.add_map("db1").unwrap();
        registry.with_map("db1", |m| m.insert(b"k", b"v")).unwrap();

        backend.fail_next_drop(1);
        assert!(matches!(
            registry.drop_map("db1"),
            Err(RegistryError::Store(StoreError::Backend(_)))
        ));
        assert_eq!(registry.names(), vec!["db1"]);
        assert_eq!(registry.with_map("db1", |m| m.get(b"k")).unwrap(), b"v");
        assert!(matches!(
            registry.add_map("db1"),
            Err(RegistryError::MapExists(_))
        ));

        registry.drop_map("db1").unwrap();
        assert!(registry.names().is_empty());
        assert!(backend.list_maps().unwrap().is_empty());
    }
}
