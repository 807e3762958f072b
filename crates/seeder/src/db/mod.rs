//! Database seeding.
//!
//! The [`BulkSeeder`] inserts generated rows with bounded concurrency and
//! collects every failure, the [`SeedGuard`] decides whether a table should
//! be seeded at all, and [`RetryPolicy`] covers transient insert failures.

mod guard;
mod retry;
mod seeder;

pub use guard::{GuardDecision, SeedGuard};
pub use retry::{RetryPolicy, insert_with_retry};
pub use seeder::{AggregateError, BulkSeeder, InsertFailure, SeedError, SeedSummary, cancelled};
