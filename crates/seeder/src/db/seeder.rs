//! Concurrent bulk seeding.
//!
//! [`BulkSeeder`] inserts rows through a [`Store`] with at most
//! `max_in_flight` inserts running at once. A row is only generated once a
//! slot is free, so memory stays bounded by the cap no matter how many rows
//! are requested. Failures are collected rather than short-circuiting: every
//! submitted insert settles before the seeder returns.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{error, info, warn};

use identifiers::{AssignedId, DefinitionRef, NewRecord, StorageError, Store};

use super::retry::{RetryPolicy, insert_with_retry};
use crate::generators::{CandidateSet, ListValueGenerator};

/// One insert that did not succeed.
#[derive(Debug, Error)]
#[error("row {index}: {source}")]
pub struct InsertFailure {
    /// Position of the row in submission order.
    pub index: usize,
    #[source]
    pub source: StorageError,
}

/// Every failure of a seeding call, plus how many inserts succeeded.
///
/// Rows that were committed before or alongside the failures stay in the
/// store.
#[derive(Debug, Error)]
#[error("{} of {} inserts failed", .errors.len(), .succeeded + .errors.len())]
pub struct AggregateError {
    pub succeeded: usize,
    pub errors: Vec<InsertFailure>,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(
        "Seeding cancelled: {succeeded} inserted, {} failed, {abandoned} abandoned",
        .errors.len()
    )]
    Cancelled {
        succeeded: usize,
        /// Inserts still running when the drain timeout expired. Whether
        /// they committed is unknown.
        abandoned: usize,
        errors: Vec<InsertFailure>,
    },
}

/// Outcome of a fully successful seeding call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub inserted: usize,
    /// Retries spent on transient failures across all rows.
    pub retries: u64,
    pub elapsed_ms: u64,
}

/// Resolves once `cancel` carries `true`. Never resolves if the sender is
/// dropped without cancelling.
pub async fn cancelled(mut cancel: watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

type InsertResult = Result<(AssignedId, u32), StorageError>;

/// Running totals for one seeding call.
#[derive(Default)]
struct Tally {
    succeeded: usize,
    retries: u64,
    failures: Vec<InsertFailure>,
    /// Task id to row index, for tasks that have not been joined yet.
    pending: HashMap<Id, usize>,
}

impl Tally {
    fn settled(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    fn record(&mut self, joined: Result<(Id, InsertResult), JoinError>) {
        match joined {
            Ok((id, Ok((_, retries)))) => {
                self.pending.remove(&id);
                self.succeeded += 1;
                self.retries += u64::from(retries);
            }
            Ok((id, Err(source))) => {
                let index = self.pending.remove(&id).unwrap_or_default();
                error!("Insert of row {index} failed: {source}");
                self.failures.push(InsertFailure { index, source });
            }
            Err(join_error) => {
                let index = self.pending.remove(&join_error.id()).unwrap_or_default();
                if join_error.is_cancelled() {
                    return;
                }
                error!("Insert task for row {index} panicked: {join_error}");
                self.failures.push(InsertFailure {
                    index,
                    source: StorageError::Backend(format!("insert task panicked: {join_error}")),
                });
            }
        }
    }
}

/// Inserts generated rows concurrently with a cap on in-flight inserts.
pub struct BulkSeeder<S: ?Sized> {
    store: Arc<S>,
    max_in_flight: usize,
    retry: RetryPolicy,
    drain_timeout: Duration,
    progress_every: usize,
}

impl<S> BulkSeeder<S>
where
    S: Store + ?Sized + 'static,
{
    /// Creates a seeder with 32 in-flight inserts and no retries.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            max_in_flight: 32,
            retry: RetryPolicy::none(),
            drain_timeout: Duration::from_secs(5),
            progress_every: 1_000,
        }
    }

    /// Sets the maximum number of concurrent inserts. Values below 1 are
    /// treated as 1.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Sets the retry policy for transient insert failures.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets how long in-flight inserts may keep running after cancellation.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Sets how many settled inserts pass between progress log lines.
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Inserts `count` list values under `parent_ref`, each taking a value
    /// drawn uniformly from `candidates`.
    pub async fn seed(
        &self,
        count: usize,
        candidates: &CandidateSet,
        parent_ref: DefinitionRef,
        rng: &mut impl Rng,
    ) -> Result<SeedSummary, SeedError> {
        self.seed_until(count, candidates, parent_ref, rng, std::future::pending())
            .await
    }

    /// Like [`BulkSeeder::seed`], but stops submitting once `cancel` resolves.
    pub async fn seed_until(
        &self,
        count: usize,
        candidates: &CandidateSet,
        parent_ref: DefinitionRef,
        rng: &mut impl Rng,
        cancel: impl Future<Output = ()>,
    ) -> Result<SeedSummary, SeedError> {
        let value_gen = ListValueGenerator::new(parent_ref, candidates.clone());
        self.seed_records(count, || value_gen.generate(rng).into(), cancel)
            .await
    }

    /// Inserts `count` records produced by `next_record`.
    ///
    /// Succeeds only if every insert succeeds. Otherwise returns
    /// [`SeedError::Aggregate`] with one entry per failed row, after all
    /// other inserts have settled. If `cancel` resolves first, no further
    /// rows are submitted and in-flight inserts get the drain timeout to
    /// finish before being aborted.
    pub async fn seed_records(
        &self,
        count: usize,
        mut next_record: impl FnMut() -> NewRecord,
        cancel: impl Future<Output = ()>,
    ) -> Result<SeedSummary, SeedError> {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks: JoinSet<InsertResult> = JoinSet::new();
        let mut tally = Tally::default();
        let mut was_cancelled = false;
        tokio::pin!(cancel);

        for index in 0..count {
            let permit = tokio::select! {
                biased;
                _ = &mut cancel => {
                    was_cancelled = true;
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => permit,
            };
            // The semaphore is owned here and never closed.
            let Ok(permit) = permit else { break };

            while let Some(joined) = tasks.try_join_next_with_id() {
                self.record(&mut tally, joined, count);
            }

            let record = next_record();
            let store = Arc::clone(&self.store);
            let retry = self.retry;
            let handle = tasks.spawn(async move {
                let result = insert_with_retry(store.as_ref(), record, &retry).await;
                drop(permit);
                result
            });
            tally.pending.insert(handle.id(), index);
        }

        let mut abandoned = 0;
        if was_cancelled {
            warn!(
                "Seeding cancelled after submitting {} of {count} rows, draining {} in-flight inserts",
                tally.settled() + tasks.len(),
                tasks.len()
            );
            let drain = async {
                while let Some(joined) = tasks.join_next_with_id().await {
                    self.record(&mut tally, joined, count);
                }
            };
            if tokio::time::timeout(self.drain_timeout, drain).await.is_err() {
                warn!("Drain timeout expired, aborting {} inserts", tasks.len());
                tasks.abort_all();
                while let Some(joined) = tasks.join_next_with_id().await {
                    match joined {
                        Err(e) if e.is_cancelled() => {
                            tally.pending.remove(&e.id());
                            abandoned += 1;
                        }
                        other => tally.record(other),
                    }
                }
            }
        } else {
            while let Some(joined) = tasks.join_next_with_id().await {
                self.record(&mut tally, joined, count);
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let Tally {
            succeeded,
            retries,
            failures,
            ..
        } = tally;

        if was_cancelled {
            return Err(SeedError::Cancelled {
                succeeded,
                abandoned,
                errors: failures,
            });
        }
        if !failures.is_empty() {
            error!(
                "Seeding finished with {} failed inserts ({succeeded} succeeded)",
                failures.len()
            );
            return Err(AggregateError {
                succeeded,
                errors: failures,
            }
            .into());
        }

        Ok(SeedSummary {
            inserted: succeeded,
            retries,
            elapsed_ms,
        })
    }

    fn record(&self, tally: &mut Tally, joined: Result<(Id, InsertResult), JoinError>, count: usize) {
        tally.record(joined);
        let settled = tally.settled();
        if settled % self.progress_every == 0 {
            info!("  Seeded {settled}/{count} rows");
        }
    }
}
