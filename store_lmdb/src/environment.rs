//! LMDB environment setup.
//!
//! One [`Environment`] is opened at startup and closed at shutdown. Stores
//! keep a cloned engine handle while they are open; the environment itself
//! decides when the shared resources are flushed and released.

use std::path::{Path, PathBuf};
use std::time::Duration;

use heed::{Env, EnvFlags, EnvOpenOptions, RoTxn, RwTxn};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::integrity::check_data_dir;
use crate::LmdbError;

/// How long `close` waits for open maps to release the engine.
const CLOSE_WAIT: Duration = Duration::from_millis(50);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Directory holding `data.mdb` and `lock.mdb`.
    pub home_dir: PathBuf,
    /// Maximum size of the memory map in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,
    /// Maximum number of maps that can exist at once.
    #[serde(default = "default_max_maps")]
    pub max_maps: u32,
    /// Size of the reader table. Every point read and every live scanner
    /// holds one slot. LMDB rounds the table up to fill its lock page, so
    /// the real capacity can be larger.
    #[serde(default = "default_max_readers")]
    pub max_readers: u32,
    /// Fsync on every commit. When false, durability comes from checkpoints.
    #[serde(default = "default_sync_on_commit")]
    pub sync_on_commit: bool,
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_max_maps() -> u32 {
    128
}

fn default_max_readers() -> u32 {
    126
}

fn default_sync_on_commit() -> bool {
    true
}

impl EnvironmentConfig {
    pub fn new(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
            map_size: default_map_size(),
            max_maps: default_max_maps(),
            max_readers: default_max_readers(),
            sync_on_commit: default_sync_on_commit(),
        }
    }
}

struct OpenEnv {
    env: Env,
    catalog: Catalog,
}

/// Wraps the LMDB environment shared by every store.
pub struct Environment {
    config: EnvironmentConfig,
    inner: Option<OpenEnv>,
}

impl Environment {
    pub fn new(config: EnvironmentConfig) -> Self {
        Self {
            config,
            inner: None,
        }
    }

    /// Open the environment, creating the home directory if needed.
    pub fn open(&mut self) -> Result<(), LmdbError> {
        if self.inner.is_some() {
            return Err(LmdbError::InvalidState(format!(
                "{} is already open",
                self.config.home_dir.display()
            )));
        }
        let home = &self.config.home_dir;
        check_data_dir(home).map_err(LmdbError::DataDir)?;
        std::fs::create_dir_all(home)?;

        let mut options = EnvOpenOptions::new();
        options
            .map_size(self.config.map_size)
            // One extra slot for the catalog database.
            .max_dbs(self.config.max_maps + 1)
            .max_readers(self.config.max_readers);
        if !self.config.sync_on_commit {
            // SAFETY: NO_SYNC only trades durability of the last commits for
            // speed; checkpoints flush explicitly.
            unsafe {
                options.flags(EnvFlags::NO_SYNC);
            }
        }
        // SAFETY: the environment is opened once per home directory and the
        // data file is not modified by anything but LMDB.
        let env = unsafe { options.open(home)? };

        let reclaimed = env.clear_stale_readers()?;
        if reclaimed > 0 {
            tracing::info!(reclaimed, "cleared stale LMDB reader slots left by a previous process");
        }
        let catalog = Catalog::open(&env)?;

        tracing::info!(
            home = %home.display(),
            map_size = self.config.map_size,
            max_maps = self.config.max_maps,
            sync_on_commit = self.config.sync_on_commit,
            "LMDB environment opened"
        );
        self.inner = Some(OpenEnv { env, catalog });
        Ok(())
    }

    /// Flush and release the environment.
    ///
    /// The engine memory map stays alive until every open store has been
    /// closed; closing the environment first only stops new work from
    /// starting through it.
    pub fn close(&mut self) -> Result<(), LmdbError> {
        let open = self.inner.take().ok_or_else(|| {
            LmdbError::InvalidState(format!("{} is not open", self.config.home_dir.display()))
        })?;
        let synced = open.env.force_sync();
        let closing = open.env.prepare_for_closing();
        if !closing.wait_timeout(CLOSE_WAIT) {
            tracing::debug!(
                home = %self.config.home_dir.display(),
                "LMDB environment still referenced by open stores, release deferred"
            );
        }
        synced?;
        tracing::info!(home = %self.config.home_dir.display(), "LMDB environment closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn home_dir(&self) -> &Path {
        &self.config.home_dir
    }

    /// The underlying heed environment.
    pub fn env(&self) -> Result<&Env, LmdbError> {
        self.open_env().map(|o| &o.env)
    }

    pub(crate) fn catalog(&self) -> Result<Catalog, LmdbError> {
        self.open_env().map(|o| o.catalog)
    }

    /// Begin a read-only transaction.
    pub fn read_txn(&self) -> Result<RoTxn<'_>, LmdbError> {
        Ok(self.env()?.read_txn()?)
    }

    /// Begin a write transaction. Commit with [`RwTxn::commit`]; dropping it
    /// aborts.
    pub fn write_txn(&self) -> Result<RwTxn<'_>, LmdbError> {
        Ok(self.env()?.write_txn()?)
    }

    /// Names of all catalogued maps, ascending.
    pub fn map_names(&self) -> Result<Vec<String>, LmdbError> {
        let open = self.open_env()?;
        let rtxn = open.env.read_txn()?;
        open.catalog.names(&rtxn)
    }

    /// Flush committed data to disk and reclaim reader slots held by dead
    /// processes. Returns the number of reclaimed slots.
    ///
    /// Intended to run periodically from the service's scheduler.
    pub fn checkpoint(&self) -> Result<usize, LmdbError> {
        let env = self.env()?;
        env.force_sync()?;
        let reclaimed = env.clear_stale_readers()?;
        if reclaimed > 0 {
            tracing::info!(reclaimed, "checkpoint reclaimed stale reader slots");
        }
        tracing::trace!("checkpoint complete");
        Ok(reclaimed)
    }

    fn open_env(&self) -> Result<&OpenEnv, LmdbError> {
        self.inner.as_ref().ok_or_else(|| {
            LmdbError::InvalidState(format!("{} is not open", self.config.home_dir.display()))
        })
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        if self.inner.is_some() {
            if let Err(e) = self.close() {
                tracing::warn!(error = %e, "failed to close LMDB environment on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_env() -> (tempfile::TempDir, Environment) {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut config = EnvironmentConfig::new(dir.path().join("env"));
        config.map_size = 16 * 1024 * 1024;
        (dir, Environment::new(config))
    }

    #[test]
    fn open_creates_home_directory() {
        let (_dir, mut env) = temp_env();
        env.open().expect("open");
        assert!(env.is_open());
        assert!(env.home_dir().join("data.mdb").exists());
    }

    #[test]
    fn double_open_is_rejected() {
        let (_dir, mut env) = temp_env();
        env.open().expect("open");
        assert!(matches!(env.open(), Err(LmdbError::InvalidState(_))));
    }

    #[test]
    fn close_without_open_is_rejected() {
        let (_dir, mut env) = temp_env();
        assert!(matches!(env.close(), Err(LmdbError::InvalidState(_))));
    }

    #[test]
    fn close_then_use_is_rejected() {
        let (_dir, mut env) = temp_env();
        env.open().expect("open");
        env.close().expect("close");
        assert!(!env.is_open());
        assert!(env.read_txn().is_err());
        assert!(env.checkpoint().is_err());
    }

    #[test]
    fn checkpoint_on_open_environment_succeeds() {
        let (_dir, mut env) = temp_env();
        env.open().expect("open");
        assert_eq!(env.checkpoint().expect("checkpoint"), 0);
    }

    #[test]
    fn fresh_environment_has_no_maps() {
        let (_dir, mut env) = temp_env();
        env.open().expect("open");
        assert!(env.map_names().expect("names").is_empty());
    }
}
