use heed::MdbError;
use thiserror::Error;

use mapkeeper_store::StoreError;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("environment {0}")]
    InvalidState(String),

    #[error("data directory rejected: {0}")]
    DataDir(String),
}

impl LmdbError {
    /// Whether the engine reported a transient resource conflict that clears
    /// once concurrent transactions finish.
    ///
    /// LMDB serializes writers on its own mutex, so the only conflict a
    /// caller can lose is the reader table filling up under concurrent
    /// readers.
    pub fn is_contention(&self) -> bool {
        matches!(self, LmdbError::Heed(heed::Error::Mdb(MdbError::ReadersFull)))
    }

    fn is_corruption(&self) -> bool {
        matches!(
            self,
            LmdbError::Heed(heed::Error::Mdb(MdbError::Corrupted | MdbError::PageNotFound))
        )
    }
}

impl From<bincode::Error> for LmdbError {
    fn from(e: bincode::Error) -> Self {
        LmdbError::Serialization(e.to_string())
    }
}

impl From<LmdbError> for StoreError {
    fn from(e: LmdbError) -> Self {
        if e.is_contention() {
            StoreError::Contention(e.to_string())
        } else if e.is_corruption() {
            StoreError::Corruption(e.to_string())
        } else {
            match e {
                LmdbError::Serialization(msg) => StoreError::Serialization(msg),
                LmdbError::InvalidState(msg) => StoreError::InvalidState(msg),
                other => StoreError::Backend(other.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_full_is_contention() {
        let err: StoreError = LmdbError::Heed(heed::Error::Mdb(MdbError::ReadersFull)).into();
        assert!(err.is_contention());
    }

    #[test]
    fn map_full_is_a_backend_error() {
        let err: StoreError = LmdbError::Heed(heed::Error::Mdb(MdbError::MapFull)).into();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn corrupted_pages_are_reported_as_corruption() {
        let err: StoreError = LmdbError::Heed(heed::Error::Mdb(MdbError::Corrupted)).into();
        assert!(matches!(err, StoreError::Corruption(_)));
    }

    #[test]
    fn invalid_state_is_preserved() {
        let err: StoreError = LmdbError::InvalidState("is not open".into()).into();
        assert!(matches!(err, StoreError::InvalidState(_)));
    }
}
