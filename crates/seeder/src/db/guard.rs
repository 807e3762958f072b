//! Seeded-once guard.
//!
//! A table is seeded only when it is empty *and* this run wins the table's
//! claim. The count check keeps sequential reruns cheap; the claim makes two
//! runners racing on an empty table agree on a single seeder.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use identifiers::{SeedClaim, StorageError, Store, Table};

/// What the guard decided for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// The table is empty and this run holds its claim.
    Proceed { claim: SeedClaim },
    /// The table already has rows.
    AlreadyPopulated { rows: u64 },
    /// The table is empty but another run claimed it first.
    ClaimedElsewhere,
}

impl GuardDecision {
    pub fn should_seed(&self) -> bool {
        matches!(self, GuardDecision::Proceed { .. })
    }
}

pub struct SeedGuard<'a, S: ?Sized> {
    store: &'a S,
    run_id: Uuid,
}

impl<'a, S> SeedGuard<'a, S>
where
    S: Store + ?Sized,
{
    pub fn new(store: &'a S, run_id: Uuid) -> Self {
        Self { store, run_id }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Decides whether this run should seed `table`.
    pub async fn check(&self, table: Table) -> Result<GuardDecision, StorageError> {
        let rows = self.store.count(table).await?;
        if rows > 0 {
            info!("{table} already holds {rows} rows, skipping");
            return Ok(GuardDecision::AlreadyPopulated { rows });
        }

        match self.store.claim(table, self.run_id).await? {
            Some(claim) => Ok(GuardDecision::Proceed { claim }),
            None => {
                info!("{table} is claimed by another run, skipping");
                Ok(GuardDecision::ClaimedElsewhere)
            }
        }
    }

    /// Gives up this run's claim on `table` if the table is still empty, so a
    /// later run can seed it. Returns whether the claim was released.
    pub async fn release_if_empty(&self, table: Table) -> Result<bool, StorageError> {
        if self.store.count(table).await? > 0 {
            return Ok(false);
        }

        let released = self.store.release(table, self.run_id).await?;
        if released {
            info!("Released claim on {table}, nothing was committed");
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identifiers::{MemoryStore, NewIdentifierListValue};

    #[tokio::test]
    async fn test_empty_table_is_claimed() {
        let store = MemoryStore::new();
        let run_id = Uuid::new_v4();
        let guard = SeedGuard::new(&store, run_id);

        let decision = guard.check(Table::IdentifierListValues).await.unwrap();

        assert!(decision.should_seed());
        let GuardDecision::Proceed { claim } = decision else {
            unreachable!()
        };
        assert_eq!(claim.run_id, run_id);
        assert_eq!(claim.table, Table::IdentifierListValues);
    }

    #[tokio::test]
    async fn test_populated_table_is_skipped() {
        let store = MemoryStore::new();
        store
            .insert_one(
                NewIdentifierListValue {
                    definition_id: 1,
                    identifier_value: "A".to_string(),
                }
                .into(),
            )
            .await
            .unwrap();

        let decision = SeedGuard::new(&store, Uuid::new_v4())
            .check(Table::IdentifierListValues)
            .await
            .unwrap();

        assert_eq!(decision, GuardDecision::AlreadyPopulated { rows: 1 });
        // Skipping must not leave a claim behind
        assert!(store.claim_for(Table::IdentifierListValues).is_none());
    }

    #[tokio::test]
    async fn test_racing_runs_agree_on_one_seeder() {
        let store = MemoryStore::new();
        let first = SeedGuard::new(&store, Uuid::new_v4());
        let second = SeedGuard::new(&store, Uuid::new_v4());

        // Both observe an empty table; only one wins the claim.
        let (a, b) = tokio::join!(
            first.check(Table::IdentifierDefinition),
            second.check(Table::IdentifierDefinition)
        );
        let decisions = [a.unwrap(), b.unwrap()];

        assert_eq!(decisions.iter().filter(|d| d.should_seed()).count(), 1);
        assert!(decisions.contains(&GuardDecision::ClaimedElsewhere));
    }

    #[tokio::test]
    async fn test_release_if_empty_lets_next_run_seed() {
        let store = MemoryStore::new();
        let failed = SeedGuard::new(&store, Uuid::new_v4());
        assert!(
            failed
                .check(Table::IdentifierDefinition)
                .await
                .unwrap()
                .should_seed()
        );

        assert!(failed.release_if_empty(Table::IdentifierDefinition).await.unwrap());

        let next = SeedGuard::new(&store, Uuid::new_v4())
            .check(Table::IdentifierDefinition)
            .await
            .unwrap();
        assert!(next.should_seed());
    }

    #[tokio::test]
    async fn test_release_keeps_claim_when_rows_were_committed() {
        let store = MemoryStore::new();
        let guard = SeedGuard::new(&store, Uuid::new_v4());
        guard.check(Table::IdentifierListValues).await.unwrap();
        store
            .insert_one(
                NewIdentifierListValue {
                    definition_id: 1,
                    identifier_value: "A".to_string(),
                }
                .into(),
            )
            .await
            .unwrap();

        assert!(!guard.release_if_empty(Table::IdentifierListValues).await.unwrap());
        assert_eq!(
            store.claim_for(Table::IdentifierListValues).map(|c| c.run_id),
            Some(guard.run_id())
        );
    }
}
