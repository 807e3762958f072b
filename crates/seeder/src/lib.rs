//! Seeding for the identifier tables.
//!
//! This crate fills `identifier_definition` and `identifier_list_values` with
//! random data and then times a joined lookup over them. The interesting part
//! is the [`db::BulkSeeder`]: thousands of inserts run concurrently under a
//! fixed cap, and every failure is collected before the call returns.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use seeder::prelude::*;
//!
//! let store = Arc::new(MemoryStore::new());
//! let candidates = CandidateSet::generate(10, 15, &mut rng)?;
//!
//! let summary = BulkSeeder::new(store.clone())
//!     .with_max_in_flight(16)
//!     .seed(10_000, &candidates, 1, &mut rng)
//!     .await?;
//! ```

pub mod config;
pub mod db;
pub mod generators;
pub mod probe;
pub mod run;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{Backend, CandidateConfig, SeedConfig};
    pub use crate::db::{
        AggregateError, BulkSeeder, GuardDecision, RetryPolicy, SeedError, SeedGuard, SeedSummary,
    };
    pub use crate::generators::{
        CandidateSet, DefinitionGenerator, ListValueGenerator, RunCandidates,
    };
    pub use crate::probe::{ProbeReport, ReadProbe};
    pub use crate::run::{RunError, RunReport, SeedRun};
    pub use identifiers::{Database, MemoryStore, Store, Table};
}
