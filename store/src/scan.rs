//! Range scan bounds, records and caller-side limit enforcement.
//!
//! Keys are ordered byte-lexicographically: the shared prefix is compared
//! byte by byte and, if equal, the shorter key sorts first. This is both
//! LMDB's default comparator and the `Ord` impl of `[u8]`, so every backend
//! and the bound checks below agree on what "ascending" means.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Compare two keys under the store ordering.
#[inline]
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrder {
    Ascending,
    Descending,
}

/// One key/value pair returned by a scan or a point read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Bytes charged against a scan's byte limit.
    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

/// Bounds and direction of a range scan.
///
/// `start` is expected to be `<= end` regardless of direction. An empty
/// `end` means the range is unbounded above. If `start > end` the scan is
/// simply empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanRange {
    pub order: ScanOrder,
    pub start: Vec<u8>,
    pub start_included: bool,
    pub end: Vec<u8>,
    pub end_included: bool,
}

impl ScanRange {
    pub fn new(
        order: ScanOrder,
        start: impl Into<Vec<u8>>,
        start_included: bool,
        end: impl Into<Vec<u8>>,
        end_included: bool,
    ) -> Self {
        Self {
            order,
            start: start.into(),
            start_included,
            end: end.into(),
            end_included,
        }
    }

    /// Every key, in the given order.
    pub fn full(order: ScanOrder) -> Self {
        Self::new(order, Vec::new(), true, Vec::new(), true)
    }

    pub fn is_end_unbounded(&self) -> bool {
        self.end.is_empty()
    }

    /// Whether `key` lies on the allowed side of the start bound.
    pub fn admits_start(&self, key: &[u8]) -> bool {
        match compare_keys(key, &self.start) {
            Ordering::Greater => true,
            Ordering::Equal => self.start_included,
            Ordering::Less => false,
        }
    }

    /// Whether `key` lies on the allowed side of the end bound.
    pub fn admits_end(&self, key: &[u8]) -> bool {
        if self.is_end_unbounded() {
            return true;
        }
        match compare_keys(key, &self.end) {
            Ordering::Less => true,
            Ordering::Equal => self.end_included,
            Ordering::Greater => false,
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.admits_start(key) && self.admits_end(key)
    }
}

/// Caller-imposed scan limits. Zero means unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanLimits {
    pub max_records: u32,
    pub max_bytes: u32,
}

impl ScanLimits {
    pub fn new(max_records: u32, max_bytes: u32) -> Self {
        Self {
            max_records,
            max_bytes,
        }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }

    fn allows_more(&self, records: usize, bytes: usize) -> bool {
        (self.max_records == 0 || records < self.max_records as usize)
            && (self.max_bytes == 0 || bytes < self.max_bytes as usize)
    }
}

/// Why a limited scan stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanStatus {
    /// No qualifying record is left in this direction within the bounds.
    Ended,
    /// A record or byte limit stopped the scan; more records may exist.
    LimitReached,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanOutcome {
    pub records: Vec<Record>,
    pub status: ScanStatus,
}

/// Boxed scanner handed out by [`crate::OrderedMap::scan`].
///
/// `None` from the iterator is the scan-ended signal. After `None` or an
/// error the scanner keeps returning `None`.
pub type RecordScan<'a> = Box<dyn Iterator<Item = Result<Record, StoreError>> + 'a>;

/// Pull records from `scan` until it ends or `limits` is reached.
///
/// The limit check happens before each pull, so the record that crosses the
/// byte limit is still returned and the scanner is never asked to peek.
pub fn collect_scan<I>(scan: I, limits: ScanLimits) -> Result<ScanOutcome, StoreError>
where
    I: IntoIterator<Item = Result<Record, StoreError>>,
{
    let mut scan = scan.into_iter();
    let mut records = Vec::new();
    let mut bytes = 0usize;
    while limits.allows_more(records.len(), bytes) {
        match scan.next() {
            Some(Ok(record)) => {
                bytes += record.size();
                records.push(record);
            }
            Some(Err(e)) => return Err(e),
            None => {
                return Ok(ScanOutcome {
                    records,
                    status: ScanStatus::Ended,
                })
            }
        }
    }
    Ok(ScanOutcome {
        records,
        status: ScanStatus::LimitReached,
    })
}
