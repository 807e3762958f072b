//! A full seeding run: definitions, list values, then the read probe.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use identifiers::{NewRecord, StorageError, Store, Table};

use crate::config::SeedConfig;
use crate::db::{BulkSeeder, GuardDecision, SeedError, SeedGuard, SeedSummary, cancelled};
use crate::generators::{CandidateError, DefinitionGenerator, RunCandidates};
use crate::probe::{ProbeReport, ReadProbe};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Database error: {0}")]
    Database(#[from] StorageError),
    #[error("Invalid candidates: {0}")]
    Candidates(#[from] CandidateError),
    #[error("Seeding {table} failed: {source}")]
    Seed {
        table: Table,
        #[source]
        source: SeedError,
    },
}

/// What happened to one table during a run.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub table: Table,
    pub guard: GuardDecision,
    /// Present when the table was seeded.
    pub seeded: Option<SeedSummary>,
}

/// Candidate pools used by a run, for reproducing its probe.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub statuses: Vec<String>,
    pub types: Vec<String>,
    pub identifier_values: Vec<String>,
}

impl From<&RunCandidates> for CandidateReport {
    fn from(candidates: &RunCandidates) -> Self {
        Self {
            statuses: candidates.statuses.values().to_vec(),
            types: candidates.types.values().to_vec(),
            identifier_values: candidates.identifier_values.values().to_vec(),
        }
    }
}

/// Everything a completed run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub candidates: CandidateReport,
    pub definitions: PhaseReport,
    pub list_values: PhaseReport,
    pub probe: ProbeReport,
    /// Tables another run was seeding when the probe ran. The probe timing
    /// may not reflect a fully seeded table.
    pub claimed_elsewhere: Vec<Table>,
}

/// Orchestrates one run against a store.
///
/// The probe only runs when both seeding phases succeeded (or were
/// skipped); a failed phase aborts the run with its error.
pub struct SeedRun<S: ?Sized> {
    store: Arc<S>,
    config: SeedConfig,
    run_id: Uuid,
}

impl<S> SeedRun<S>
where
    S: Store + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, config: SeedConfig) -> Self {
        Self {
            store,
            config,
            run_id: Uuid::new_v4(),
        }
    }

    /// Overrides the generated run id.
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Executes the run. Setting `cancel` to `true` stops seeding.
    pub async fn execute(
        &self,
        rng: &mut impl Rng,
        cancel: watch::Receiver<bool>,
    ) -> Result<RunReport, RunError> {
        info!("Starting seed run {}", self.run_id);

        if self.config.reset {
            self.store.reset().await?;
        }

        let candidates = RunCandidates::generate(&self.config, rng)?;
        let guard = SeedGuard::new(self.store.as_ref(), self.run_id);

        let definitions = self
            .seed_definitions(&guard, &candidates, rng, cancel.clone())
            .await?;
        let list_values = self
            .seed_list_values(&guard, &candidates, rng, cancel)
            .await?;

        let claimed_elsewhere: Vec<Table> = [&definitions, &list_values]
            .into_iter()
            .filter(|phase| phase.guard == GuardDecision::ClaimedElsewhere)
            .map(|phase| phase.table)
            .collect();
        for table in &claimed_elsewhere {
            warn!("{table} is being seeded by another run; probe timing may not be representative");
        }

        let probe = ReadProbe::new(self.config.probe_statuses, self.config.probe_values)
            .run(self.store.as_ref(), &candidates, rng)
            .await?;

        Ok(RunReport {
            run_id: self.run_id,
            candidates: CandidateReport::from(&candidates),
            definitions,
            list_values,
            probe,
            claimed_elsewhere,
        })
    }

    /// Inserts definitions one at a time.
    async fn seed_definitions(
        &self,
        guard: &SeedGuard<'_, S>,
        candidates: &RunCandidates,
        rng: &mut impl Rng,
        cancel: watch::Receiver<bool>,
    ) -> Result<PhaseReport, RunError> {
        let table = Table::IdentifierDefinition;
        let decision = guard.check(table).await?;
        if !decision.should_seed() {
            return Ok(PhaseReport {
                table,
                guard: decision,
                seeded: None,
            });
        }

        let count = self.config.definition_count;
        info!("Seeding {count} definitions...");
        let definition_gen = DefinitionGenerator::new(
            self.config.definition_id,
            candidates.statuses.clone(),
            candidates.types.clone(),
        );
        let outcome = self
            .seeder()
            .with_max_in_flight(1)
            .seed_records(
                count,
                || NewRecord::from(definition_gen.generate(rng)),
                cancelled(cancel),
            )
            .await;
        let summary = match outcome {
            Ok(summary) => summary,
            Err(source) => return Err(self.phase_failed(guard, table, source).await),
        };
        info!("Seeded {} definitions", summary.inserted);

        Ok(PhaseReport {
            table,
            guard: decision,
            seeded: Some(summary),
        })
    }

    /// Inserts list values concurrently.
    async fn seed_list_values(
        &self,
        guard: &SeedGuard<'_, S>,
        candidates: &RunCandidates,
        rng: &mut impl Rng,
        cancel: watch::Receiver<bool>,
    ) -> Result<PhaseReport, RunError> {
        let table = Table::IdentifierListValues;
        let decision = guard.check(table).await?;
        if !decision.should_seed() {
            return Ok(PhaseReport {
                table,
                guard: decision,
                seeded: None,
            });
        }

        let count = self.config.list_value_count;
        info!(
            "Seeding {count} list values ({} in flight)...",
            self.config.max_in_flight
        );
        let outcome = self
            .seeder()
            .seed_until(
                count,
                &candidates.identifier_values,
                self.config.definition_id,
                rng,
                cancelled(cancel),
            )
            .await;
        let summary = match outcome {
            Ok(summary) => summary,
            Err(source) => return Err(self.phase_failed(guard, table, source).await),
        };
        info!(
            "Seeded {} list values in {}ms",
            summary.inserted, summary.elapsed_ms
        );

        Ok(PhaseReport {
            table,
            guard: decision,
            seeded: Some(summary),
        })
    }

    /// Turns a seeding failure into the run error, first giving back the
    /// table's claim when nothing reached it.
    async fn phase_failed(
        &self,
        guard: &SeedGuard<'_, S>,
        table: Table,
        source: SeedError,
    ) -> RunError {
        if let Err(e) = guard.release_if_empty(table).await {
            warn!("Could not release claim on {table}: {e}");
        }
        RunError::Seed { table, source }
    }

    fn seeder(&self) -> BulkSeeder<S> {
        BulkSeeder::new(Arc::clone(&self.store))
            .with_max_in_flight(self.config.max_in_flight)
            .with_retry(self.config.retry)
            .with_drain_timeout(Duration::from_millis(self.config.drain_timeout_ms))
            .with_progress_every(self.config.progress_every)
    }
}
