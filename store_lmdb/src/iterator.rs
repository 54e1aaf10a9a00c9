//! Bidirectional range scanner over one LMDB map.
//!
//! A scanner owns a read transaction for its whole life and moves an
//! [`EngineCursor`] through it one record per `next()` call. The transaction
//! pins a reader slot, so it is released as soon as the scan ends and, at
//! the latest, when the scanner is dropped.
//!
//! Positioning rules:
//! - ascending: seek to the first key `>= start`, or to the first key when
//!   `start` is empty (LMDB rejects zero-length keys in a seek);
//! - descending with an unbounded end: seek to the last key;
//! - descending with an end key: seek to the first key `>= end`, or to the
//!   last key if there is none. The cursor may then sit one record past the
//!   end bound, which the first `next()` call filters out.
//!
//! The first `next()` reads the record under the cursor, later calls step
//! forward or backward.

use std::iter::FusedIterator;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn};

use mapkeeper_store::{Record, ScanOrder, ScanRange, StoreError};

use crate::LmdbError;

/// Positioned handle over an ordered database inside one read transaction.
pub(crate) struct EngineCursor<'e> {
    txn: RoTxn<'e>,
    db: Database<Bytes, Bytes>,
    position: Option<Vec<u8>>,
}

impl<'e> EngineCursor<'e> {
    pub(crate) fn open(env: &'e Env, db: Database<Bytes, Bytes>) -> Result<Self, LmdbError> {
        Ok(Self {
            txn: env.read_txn()?,
            db,
            position: None,
        })
    }

    /// Move to the first key `>= key`. Returns `false` if there is none.
    pub(crate) fn seek_ge(&mut self, key: &[u8]) -> Result<bool, LmdbError> {
        let found = self
            .db
            .get_greater_than_or_equal_to(&self.txn, key)?
            .map(|(k, _)| k.to_vec());
        Ok(self.reposition(found))
    }

    /// Move to the first key. Returns `false` if the database is empty.
    pub(crate) fn seek_first(&mut self) -> Result<bool, LmdbError> {
        let found = self.db.first(&self.txn)?.map(|(k, _)| k.to_vec());
        Ok(self.reposition(found))
    }

    /// Move to the last key. Returns `false` if the database is empty.
    pub(crate) fn seek_last(&mut self) -> Result<bool, LmdbError> {
        let found = self.db.last(&self.txn)?.map(|(k, _)| k.to_vec());
        Ok(self.reposition(found))
    }

    /// Record under the cursor.
    pub(crate) fn current(&self) -> Result<Option<Record>, LmdbError> {
        let Some(key) = self.position.as_deref() else {
            return Ok(None);
        };
        Ok(self
            .db
            .get(&self.txn, key)?
            .map(|value| Record::new(key, value)))
    }

    /// Step to the next key and return its record.
    pub(crate) fn step_forward(&mut self) -> Result<Option<Record>, LmdbError> {
        let next = match self.position.as_deref() {
            Some(key) => self
                .db
                .get_greater_than(&self.txn, key)?
                .map(|(k, v)| Record::new(k, v)),
            None => None,
        };
        Ok(self.advance_to(next))
    }

    /// Step to the previous key and return its record.
    pub(crate) fn step_backward(&mut self) -> Result<Option<Record>, LmdbError> {
        let prev = match self.position.as_deref() {
            Some(key) => self
                .db
                .get_lower_than(&self.txn, key)?
                .map(|(k, v)| Record::new(k, v)),
            None => None,
        };
        Ok(self.advance_to(prev))
    }

    fn reposition(&mut self, key: Option<Vec<u8>>) -> bool {
        let found = key.is_some();
        self.position = key;
        found
    }

    // Running off either end leaves the cursor where it was.
    fn advance_to(&mut self, record: Option<Record>) -> Option<Record> {
        if let Some(r) = &record {
            self.position = Some(r.key.clone());
        }
        record
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    /// The cursor sits on a record that has not been read yet.
    Positioned,
    /// At least one record was read; the next read steps first.
    Advancing,
    Exhausted,
}

enum Verdict {
    Emit,
    Skip,
    Stop,
}

/// Range scan over one map. Yields `Ok(record)` per qualifying record and
/// `None` once the range is exhausted.
pub struct LmdbRangeScanner<'s> {
    cursor: Option<EngineCursor<'s>>,
    range: ScanRange,
    state: ScanState,
}

impl<'s> LmdbRangeScanner<'s> {
    /// Open a read transaction and position the cursor for `range`.
    pub fn init(
        env: &'s Env,
        db: Database<Bytes, Bytes>,
        range: ScanRange,
    ) -> Result<Self, LmdbError> {
        let mut cursor = EngineCursor::open(env, db)?;
        let positioned = match range.order {
            ScanOrder::Ascending if range.start.is_empty() => cursor.seek_first()?,
            ScanOrder::Ascending => cursor.seek_ge(&range.start)?,
            ScanOrder::Descending if range.is_end_unbounded() => cursor.seek_last()?,
            // Every stored key is below `end` when nothing is >= it, so the
            // last key is the right starting point.
            ScanOrder::Descending => cursor.seek_ge(&range.end)? || cursor.seek_last()?,
        };

        let mut scanner = Self {
            cursor: Some(cursor),
            range,
            state: ScanState::Positioned,
        };
        if !positioned {
            scanner.finish();
        }
        Ok(scanner)
    }

    pub fn range(&self) -> &ScanRange {
        &self.range
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == ScanState::Exhausted
    }

    fn read(&mut self) -> Result<Option<Record>, LmdbError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        match self.state {
            ScanState::Exhausted => Ok(None),
            ScanState::Positioned => {
                self.state = ScanState::Advancing;
                cursor.current()
            }
            ScanState::Advancing => match self.range.order {
                ScanOrder::Ascending => cursor.step_forward(),
                ScanOrder::Descending => cursor.step_backward(),
            },
        }
    }

    fn judge(&self, key: &[u8]) -> Verdict {
        match self.range.order {
            // Only the very first record can equal an excluded start key.
            ScanOrder::Ascending if !self.range.admits_start(key) => Verdict::Skip,
            ScanOrder::Ascending if !self.range.admits_end(key) => Verdict::Stop,
            // Descending starts at or one past the end bound: filter there,
            // and stop once the walk crosses the start bound.
            ScanOrder::Descending if !self.range.admits_end(key) => Verdict::Skip,
            ScanOrder::Descending if !self.range.admits_start(key) => Verdict::Stop,
            _ => Verdict::Emit,
        }
    }

    /// Mark the scan ended and give the reader slot back.
    fn finish(&mut self) {
        self.state = ScanState::Exhausted;
        self.cursor = None;
    }
}

impl Iterator for LmdbRangeScanner<'_> {
    type Item = Result<Record, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.read() {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.finish();
                    return None;
                }
                Err(e) => {
                    tracing::error!(error = %e, "range scan read failed");
                    self.finish();
                    return Some(Err(e.into()));
                }
            };
            match self.judge(&record.key) {
                Verdict::Emit => return Some(Ok(record)),
                Verdict::Skip => continue,
                Verdict::Stop => {
                    self.finish();
                    return None;
                }
            }
        }
    }
}

impl FusedIterator for LmdbRangeScanner<'_> {}
