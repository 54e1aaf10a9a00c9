//! Per-operation counters for the map service.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Operation names counted by the service.
pub const OPERATIONS: &[&str] = &[
    "ping", "add_map", "drop_map", "list_maps", "get", "put", "insert", "update", "remove",
    "scan", "stats",
];

struct Counter {
    calls: AtomicU64,
    errors: AtomicU64,
}

/// Thread-safe call and error counters, one pair per operation.
pub struct OpStats {
    counters: BTreeMap<&'static str, Counter>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpSnapshot {
    pub calls: u64,
    pub errors: u64,
}

/// Point-in-time copy of all counters, keyed by operation name.
pub type StatsSnapshot = BTreeMap<String, OpSnapshot>;

impl OpStats {
    pub fn new(names: &[&'static str]) -> Self {
        let counters = names
            .iter()
            .map(|&name| {
                (
                    name,
                    Counter {
                        calls: AtomicU64::new(0),
                        errors: AtomicU64::new(0),
                    },
                )
            })
            .collect();
        Self { counters }
    }

    /// Count one call of `op`, and one error if `failed`. Unknown names are
    /// ignored.
    pub fn record(&self, op: &str, failed: bool) {
        if let Some(counter) = self.counters.get(op) {
            counter.calls.fetch_add(1, Ordering::Relaxed);
            if failed {
                counter.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn calls(&self, op: &str) -> u64 {
        self.counters
            .get(op)
            .map(|c| c.calls.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn errors(&self, op: &str) -> u64 {
        self.counters
            .get(op)
            .map(|c| c.errors.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.counters
            .iter()
            .map(|(&name, c)| {
                (
                    name.to_string(),
                    OpSnapshot {
                        calls: c.calls.load(Ordering::Relaxed),
                        errors: c.errors.load(Ordering::Relaxed),
                    },
                )
            })
            .collect()
    }
}

impl Default for OpStats {
    fn default() -> Self {
        Self::new(OPERATIONS)
    }
}
