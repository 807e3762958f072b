//! Read-latency probe over the seeded tables.

use std::time::Instant;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use identifiers::{IdentifierListValue, ListValueQuery, StorageError, Store};

use crate::generators::RunCandidates;

/// Result of one probe query.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub query: ListValueQuery,
    pub rows: u64,
    pub elapsed_ms: f64,
}

/// Runs the joined list-value lookup with randomly chosen parameters and
/// times it.
#[derive(Debug, Clone, Copy)]
pub struct ReadProbe {
    statuses: usize,
    values: usize,
}

impl Default for ReadProbe {
    fn default() -> Self {
        Self {
            statuses: 1,
            values: 1,
        }
    }
}

impl ReadProbe {
    /// Sets how many statuses and identifier values are sampled per query.
    pub fn new(statuses: usize, values: usize) -> Self {
        Self {
            statuses: statuses.max(1),
            values: values.max(1),
        }
    }

    /// Builds query parameters from the run's candidate pools.
    pub fn query(&self, candidates: &RunCandidates, rng: &mut impl Rng) -> ListValueQuery {
        ListValueQuery {
            statuses: candidates.statuses.sample(self.statuses, rng),
            list_type: candidates.types.choose(rng).to_string(),
            values: candidates.identifier_values.sample(self.values, rng),
        }
    }

    pub async fn run<S>(
        &self,
        store: &S,
        candidates: &RunCandidates,
        rng: &mut impl Rng,
    ) -> Result<ProbeReport, StorageError>
    where
        S: Store + ?Sized,
    {
        let query = self.query(candidates, rng);
        info!("Reading db");

        let started = Instant::now();
        let mut row_number = 0u64;
        let rows = store
            .find_list_values(&query, &mut |row: IdentifierListValue| {
                debug!(
                    "Reading row {row_number} (id {}, value {})",
                    row.id, row.identifier_value
                );
                row_number += 1;
            })
            .await?;
        let elapsed = started.elapsed();

        info!("Done reading {rows} rows in {elapsed:?}");
        Ok(ProbeReport {
            query,
            rows,
            elapsed_ms: elapsed.as_secs_f64() * 1_000.0,
        })
    }
}
