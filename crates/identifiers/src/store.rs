//! The storage seam used by the seeder.
//!
//! Seeding only needs a handful of operations from a backend: count a table,
//! insert one row, claim and release a table for a run, run the joined lookup, and wipe
//! everything. [`crate::Database`] implements them against Postgres and
//! [`crate::MemoryStore`] keeps them in process.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::StorageError;
use crate::models::{AssignedId, IdentifierListValue, ListValueQuery, NewRecord, SeedClaim, Table};

/// Callback receiving each row of a lookup as it is read.
pub type RowHandler<'a> = &'a mut (dyn FnMut(IdentifierListValue) + Send);

#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the current number of rows in `table`.
    async fn count(&self, table: Table) -> Result<u64, StorageError>;

    /// Persists one record and returns its surrogate key.
    async fn insert_one(&self, record: NewRecord) -> Result<AssignedId, StorageError>;

    /// Claims `table` for `run_id`. Returns `None` when another run already
    /// holds the claim.
    async fn claim(&self, table: Table, run_id: Uuid) -> Result<Option<SeedClaim>, StorageError>;

    /// Drops the claim on `table` if `run_id` holds it. Returns whether a
    /// claim was removed.
    async fn release(&self, table: Table, run_id: Uuid) -> Result<bool, StorageError>;

    /// Streams every list value matching `query` to `handler` and returns how
    /// many rows were delivered.
    async fn find_list_values(
        &self,
        query: &ListValueQuery,
        handler: RowHandler<'_>,
    ) -> Result<u64, StorageError>;

    /// Deletes all seeded rows and claims.
    async fn reset(&self) -> Result<(), StorageError>;
}
