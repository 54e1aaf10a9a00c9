use mapkeeper_store::{MapBackend, RetryPolicy, StoreError};

use crate::integrity::check_integrity;
use crate::{Environment, EnvironmentConfig, LmdbError, LmdbStore};

/// LMDB engine hosting every map of one data directory.
pub struct LmdbBackend {
    env: Environment,
    retry: RetryPolicy,
}

impl LmdbBackend {
    /// Open the environment and verify the catalog before serving.
    pub fn open(config: EnvironmentConfig, retry: RetryPolicy) -> Result<Self, LmdbError> {
        let mut env = Environment::new(config);
        env.open()?;

        let report = check_integrity(&env)?;
        if report.is_healthy() {
            tracing::info!(
                maps = report.maps_checked,
                records = report.total_records,
                "integrity check passed"
            );
        } else {
            for error in &report.errors {
                tracing::warn!(%error, "integrity check");
            }
        }

        Ok(Self { env, retry })
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Flush and close the environment.
    pub fn close(mut self) -> Result<(), LmdbError> {
        self.env.close()
    }
}

impl MapBackend for LmdbBackend {
    type Map = LmdbStore;

    fn create_map(&self, name: &str) -> Result<LmdbStore, StoreError> {
        let mut store = LmdbStore::new(self.retry);
        store.create(&self.env, name)?;
        Ok(store)
    }

    fn open_map(&self, name: &str) -> Result<LmdbStore, StoreError> {
        let mut store = LmdbStore::new(self.retry);
        store.open(&self.env, name)?;
        Ok(store)
    }

    fn drop_map(&self, map: &mut LmdbStore) -> Result<(), StoreError> {
        map.drop_store()
    }

    fn close_map(&self, mut map: LmdbStore) -> Result<(), StoreError> {
        map.close()
    }

    fn list_maps(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.env.map_names()?)
    }

    fn checkpoint(&self) -> Result<(), StoreError> {
        self.env.checkpoint()?;
        Ok(())
    }
}
