//! LMDB database integrity checks.
//!
//! Run on startup to detect a damaged catalog early, before the service
//! starts accepting requests.

use std::path::Path;

use heed::types::Bytes;

use crate::catalog::data_db_name;
use crate::{Environment, LmdbError};

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub maps_checked: u32,
    pub total_records: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Verify that every catalogued map has a readable data database.
///
/// Read failures are recorded in the report rather than aborting the check.
pub fn check_integrity(env: &Environment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let names = env.map_names()?;
    let heed_env = env.env()?;
    let rtxn = heed_env.read_txn()?;

    for name in names {
        let db_name = data_db_name(&name);
        match heed_env.open_database::<Bytes, Bytes>(&rtxn, Some(db_name.as_str())) {
            Ok(Some(db)) => {
                report.maps_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_records += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read map '{name}': {e}")),
                }
            }
            Ok(None) => report
                .errors
                .push(format!("map '{name}' is catalogued but has no database")),
            Err(e) => report
                .errors
                .push(format!("failed to open map '{name}': {e}")),
        }
    }

    Ok(report)
}

/// Check that the data directory looks usable before opening.
///
/// A missing or empty directory is a fresh start. A directory holding an
/// LMDB lock file but no data file suggests a partial copy or corruption.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    if !path.is_dir() {
        return Err(format!("{} exists but is not a directory", path.display()));
    }
    if path.join("lock.mdb").exists() && !path.join("data.mdb").exists() {
        return Err(format!(
            "LMDB lock file present but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
