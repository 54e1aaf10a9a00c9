//! Bounded retry for operations that can lose a lock race.
//!
//! Every attempt ends in one of three ways:
//! - a definitive result (`Ok`, [`StoreError::NotFound`],
//!   [`StoreError::AlreadyExists`]) which is returned immediately;
//! - [`StoreError::Contention`], which starts another attempt;
//! - any other error, which is logged and returned without retrying.
//!
//! When every attempt is contended the policy gives up with
//! [`StoreError::RetriesExhausted`] instead of spinning forever.

use crate::StoreError;

/// Default attempt ceiling for store mutations.
pub const DEFAULT_RETRY_BUDGET: u32 = 100;

/// Attempt ceiling shared by all point operations of one store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `attempt` until it produces a non-contended outcome or the budget
    /// runs out. `op` names the operation in logs and in the exhaustion error.
    pub fn run<T, F>(&self, op: &'static str, mut attempt: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Result<T, StoreError>,
    {
        for n in 1..=self.max_attempts {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_definitive() => return Err(e),
                Err(e) if e.is_contention() => {
                    tracing::trace!(op, attempt = n, error = %e, "contended, retrying");
                }
                Err(e) => {
                    tracing::error!(op, error = %e, "unexpected storage error");
                    return Err(e);
                }
            }
        }
        tracing::warn!(
            op,
            attempts = self.max_attempts,
            "retry budget exhausted"
        );
        Err(StoreError::RetriesExhausted {
            op,
            attempts: self.max_attempts,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_BUDGET)
    }
}
