//! In-process store for dry runs and tests.
//!
//! [`MemoryStore`] follows the same contract as [`crate::Database`] and adds
//! knobs that a real database cannot offer: simulated insert latency,
//! failures injected on chosen insert calls, and counters for how many
//! inserts are in flight at once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::StorageError;
use crate::models::{
    AssignedId, IdentifierDefinition, IdentifierListValue, ListValueQuery, NewRecord, SeedClaim,
    Table,
};
use crate::store::{RowHandler, Store};

/// Failure class injected by [`MemoryStore::with_fault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Connection,
    Timeout,
    Constraint,
}

impl FaultKind {
    fn to_error(self, call: u64) -> StorageError {
        match self {
            FaultKind::Connection => {
                StorageError::Connection(format!("injected connection reset on insert #{call}"))
            }
            FaultKind::Timeout => StorageError::Timeout(format!("injected timeout on insert #{call}")),
            FaultKind::Constraint => {
                StorageError::Constraint(format!("injected constraint violation on insert #{call}"))
            }
        }
    }
}

#[derive(Default)]
struct MemoryState {
    definitions: Vec<IdentifierDefinition>,
    list_values: Vec<IdentifierListValue>,
    claims: HashMap<Table, SeedClaim>,
    next_definition_id: AssignedId,
    next_list_value_id: AssignedId,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    latency: Option<Duration>,
    /// Insert call number (1-based) to the failure it should produce.
    faults: HashMap<u64, FaultKind>,
    insert_calls: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Tracks one insert for the in-flight counters.
struct InFlight<'a> {
    current: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every insert sleep for `latency` before committing.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the `call`-th insert (counting from 1) fail with `kind`.
    pub fn with_fault(mut self, call: u64, kind: FaultKind) -> Self {
        self.faults.insert(call, kind);
        self
    }

    /// Rows currently stored in `identifier_definition`.
    pub fn definitions(&self) -> Vec<IdentifierDefinition> {
        self.lock().definitions.clone()
    }

    /// Rows currently stored in `identifier_list_values`.
    pub fn list_values(&self) -> Vec<IdentifierListValue> {
        self.lock().list_values.clone()
    }

    /// Claim currently held on `table`, if any.
    pub fn claim_for(&self, table: Table) -> Option<SeedClaim> {
        self.lock().claims.get(&table).cloned()
    }

    /// Number of `insert_one` calls made so far, failed ones included.
    pub fn insert_calls(&self) -> u64 {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// Highest number of inserts observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn count(&self, table: Table) -> Result<u64, StorageError> {
        let state = self.lock();
        let count = match table {
            Table::IdentifierDefinition => state.definitions.len(),
            Table::IdentifierListValues => state.list_values.len(),
        };
        Ok(count as u64)
    }

    async fn insert_one(&self, record: NewRecord) -> Result<AssignedId, StorageError> {
        let call = self.insert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight::enter(&self.in_flight, &self.peak_in_flight);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(kind) = self.faults.get(&call) {
            return Err(kind.to_error(call));
        }

        let mut state = self.lock();
        let id = match record {
            NewRecord::Definition(definition) => {
                state.next_definition_id += 1;
                let id = state.next_definition_id;
                state.definitions.push(IdentifierDefinition {
                    id,
                    definition_id: definition.definition_id,
                    status: definition.status,
                    list_type: definition.list_type,
                });
                id
            }
            NewRecord::ListValue(value) => {
                state.next_list_value_id += 1;
                let id = state.next_list_value_id;
                state.list_values.push(IdentifierListValue {
                    id,
                    definition_id: value.definition_id,
                    identifier_value: value.identifier_value,
                });
                id
            }
        };

        Ok(id)
    }

    async fn claim(&self, table: Table, run_id: Uuid) -> Result<Option<SeedClaim>, StorageError> {
        let mut state = self.lock();
        if state.claims.contains_key(&table) {
            return Ok(None);
        }

        let claim = SeedClaim {
            table,
            run_id,
            claimed_at: OffsetDateTime::now_utc(),
        };
        state.claims.insert(table, claim.clone());
        Ok(Some(claim))
    }

    async fn release(&self, table: Table, run_id: Uuid) -> Result<bool, StorageError> {
        let mut state = self.lock();
        match state.claims.get(&table) {
            Some(claim) if claim.run_id == run_id => {
                state.claims.remove(&table);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_list_values(
        &self,
        query: &ListValueQuery,
        handler: RowHandler<'_>,
    ) -> Result<u64, StorageError> {
        // Same row multiplicity as the SQL join: one output row per matching
        // (definition, list value) pair.
        let matches: Vec<IdentifierListValue> = {
            let state = self.lock();
            state
                .definitions
                .iter()
                .filter(|d| d.list_type == query.list_type && query.statuses.contains(&d.status))
                .flat_map(|d| {
                    state.list_values.iter().filter(move |v| {
                        v.definition_id == d.definition_id
                            && query.values.contains(&v.identifier_value)
                    })
                })
                .cloned()
                .collect()
        };

        let delivered = matches.len() as u64;
        for row in matches {
            handler(row);
        }

        Ok(delivered)
    }

    async fn reset(&self) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.definitions.clear();
        state.list_values.clear();
        state.claims.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewIdentifierDefinition, NewIdentifierListValue};

    fn list_value(value: &str) -> NewRecord {
        NewIdentifierListValue {
            definition_id: 1,
            identifier_value: value.to_string(),
        }
        .into()
    }

    fn definition(status: &str, list_type: &str) -> NewRecord {
        NewIdentifierDefinition {
            definition_id: 1,
            status: status.to_string(),
            list_type: list_type.to_string(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = MemoryStore::new();

        assert_eq!(store.insert_one(list_value("A")).await.unwrap(), 1);
        assert_eq!(store.insert_one(list_value("B")).await.unwrap(), 2);
        assert_eq!(store.insert_one(definition("S", "T")).await.unwrap(), 1);

        assert_eq!(store.count(Table::IdentifierListValues).await.unwrap(), 2);
        assert_eq!(store.count(Table::IdentifierDefinition).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_injected_fault_persists_nothing() {
        let store = MemoryStore::new().with_fault(2, FaultKind::Constraint);

        store.insert_one(list_value("A")).await.unwrap();
        let err = store.insert_one(list_value("B")).await.unwrap_err();
        store.insert_one(list_value("C")).await.unwrap();

        assert!(matches!(err, StorageError::Constraint(_)));
        assert_eq!(store.insert_calls(), 3);
        let values: Vec<_> = store
            .list_values()
            .into_iter()
            .map(|v| v.identifier_value)
            .collect();
        assert_eq!(values, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let store = MemoryStore::new();
        let first = Uuid::new_v4();

        let claim = store
            .claim(Table::IdentifierListValues, first)
            .await
            .unwrap()
            .expect("first claim should win");
        assert_eq!(claim.run_id, first);

        let second = store
            .claim(Table::IdentifierListValues, Uuid::new_v4())
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(
            store.claim_for(Table::IdentifierListValues).map(|c| c.run_id),
            Some(first)
        );

        // Claims are per table
        assert!(
            store
                .claim(Table::IdentifierDefinition, Uuid::new_v4())
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_release_only_drops_own_claim() {
        let store = MemoryStore::new();
        let holder = Uuid::new_v4();
        store
            .claim(Table::IdentifierDefinition, holder)
            .await
            .unwrap();

        assert!(
            !store
                .release(Table::IdentifierDefinition, Uuid::new_v4())
                .await
                .unwrap()
        );
        assert!(store.claim_for(Table::IdentifierDefinition).is_some());

        assert!(store.release(Table::IdentifierDefinition, holder).await.unwrap());
        assert!(store.claim_for(Table::IdentifierDefinition).is_none());

        // Released tables can be claimed again
        assert!(
            store
                .claim(Table::IdentifierDefinition, Uuid::new_v4())
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_find_list_values_joins_through_definitions() {
        let store = MemoryStore::new();
        store.insert_one(definition("ACTIVE", "ALLOW")).await.unwrap();
        store.insert_one(definition("ACTIVE", "DENY")).await.unwrap();
        store.insert_one(definition("RETIRED", "ALLOW")).await.unwrap();
        for value in ["X", "Y", "X"] {
            store.insert_one(list_value(value)).await.unwrap();
        }

        let query = ListValueQuery {
            statuses: vec!["ACTIVE".to_string()],
            list_type: "ALLOW".to_string(),
            values: vec!["X".to_string()],
        };
        let mut seen = Vec::new();
        let delivered = store
            .find_list_values(&query, &mut |row: IdentifierListValue| seen.push(row.id))
            .await
            .unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(seen, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_reset_clears_rows_and_claims() {
        let store = MemoryStore::new();
        store.insert_one(list_value("A")).await.unwrap();
        store
            .claim(Table::IdentifierListValues, Uuid::new_v4())
            .await
            .unwrap();

        store.reset().await.unwrap();

        assert_eq!(store.count(Table::IdentifierListValues).await.unwrap(), 0);
        assert!(store.claim_for(Table::IdentifierListValues).is_none());
    }
}
