//! Bounded retry for transient insert failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use identifiers::{AssignedId, NewRecord, StorageError, Store};

/// How often and how patiently a failed insert is retried.
///
/// Only transient failures (connection loss, timeouts) are retried.
/// Constraint violations fail on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 50,
            max_backoff_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before retry number `retry` (starting at 1), doubling each time.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        let delay = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }

    /// Whether a failure after `retries_so_far` retries should be retried.
    pub fn should_retry(&self, err: &StorageError, retries_so_far: u32) -> bool {
        err.is_transient() && retries_so_far < self.max_retries
    }
}

/// Inserts `record`, retrying transient failures under `policy`.
///
/// Returns the assigned id together with the number of retries it took.
pub async fn insert_with_retry<S>(
    store: &S,
    record: NewRecord,
    policy: &RetryPolicy,
) -> Result<(AssignedId, u32), StorageError>
where
    S: Store + ?Sized,
{
    let mut retries = 0;
    loop {
        match store.insert_one(record.clone()).await {
            Ok(id) => return Ok((id, retries)),
            Err(e) if policy.should_retry(&e, retries) => {
                retries += 1;
                let delay = policy.backoff(retries);
                warn!(
                    "Insert into {} failed ({e}), retry {}/{} in {:?}",
                    record.table(),
                    retries,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
