use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{PgPool, postgres::PgPoolOptions};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::errors::StorageError;
use crate::models::{
    AssignedId, IdentifierDefinition, IdentifierListValue, ListValueQuery, NewRecord, SeedClaim,
    Table,
};
use crate::store::{RowHandler, Store};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Migrations applied");
        Ok(())
    }

    pub async fn get_definitions(&self) -> Result<Vec<IdentifierDefinition>, StorageError> {
        let definitions = sqlx::query_as(
            r#"
            SELECT id, definition_id, status, type
            FROM identifier_definition
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(definitions)
    }

    pub async fn get_list_values(
        &self,
        definition_id: i32,
    ) -> Result<Vec<IdentifierListValue>, StorageError> {
        let values = sqlx::query_as(
            r#"
            SELECT id, definition_id, identifier_value
            FROM identifier_list_values
            WHERE definition_id = $1
            ORDER BY id
            "#,
        )
        .bind(definition_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(values)
    }

    /// Returns a reference to the pool for advanced usage.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for Database {
    async fn count(&self, table: Table) -> Result<u64, StorageError> {
        // Table names come from a closed enum, never from input.
        let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;

        Ok(count.max(0) as u64)
    }

    async fn insert_one(&self, record: NewRecord) -> Result<AssignedId, StorageError> {
        let id: AssignedId = match record {
            NewRecord::Definition(definition) => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO identifier_definition (definition_id, status, type)
                    VALUES ($1, $2, $3)
                    RETURNING id
                    "#,
                )
                .bind(definition.definition_id)
                .bind(&definition.status)
                .bind(&definition.list_type)
                .fetch_one(&self.pool)
                .await?
            }
            NewRecord::ListValue(value) => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO identifier_list_values (definition_id, identifier_value)
                    VALUES ($1, $2)
                    RETURNING id
                    "#,
                )
                .bind(value.definition_id)
                .bind(&value.identifier_value)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(id)
    }

    async fn claim(&self, table: Table, run_id: Uuid) -> Result<Option<SeedClaim>, StorageError> {
        let claimed_at = OffsetDateTime::now_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO seed_claims (table_name, run_id, claimed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (table_name) DO NOTHING
            "#,
        )
        .bind(table.as_str())
        .bind(run_id)
        .bind(claimed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(Some(SeedClaim {
                table,
                run_id,
                claimed_at,
            }))
        } else {
            Ok(None)
        }
    }

    async fn find_list_values(
        &self,
        query: &ListValueQuery,
        handler: RowHandler<'_>,
    ) -> Result<u64, StorageError> {
        let mut rows = sqlx::query_as::<_, IdentifierListValue>(
            r#"
            SELECT iv.id, iv.definition_id, iv.identifier_value
            FROM identifier_definition id
            INNER JOIN identifier_list_values iv ON id.definition_id = iv.definition_id
            WHERE id.status = ANY($1)
              AND id.type = $2
              AND iv.identifier_value = ANY($3)
            "#,
        )
        .bind(&query.statuses[..])
        .bind(&query.list_type)
        .bind(&query.values[..])
        .fetch(&self.pool);

        let mut delivered = 0;
        while let Some(row) = rows.try_next().await? {
            handler(row);
            delivered += 1;
        }

        Ok(delivered)
    }

    async fn release(&self, table: Table, run_id: Uuid) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM seed_claims WHERE table_name = $1 AND run_id = $2")
            .bind(table.as_str())
            .bind(run_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn reset(&self) -> Result<(), StorageError> {
        info!("Clearing seeded identifier data...");

        sqlx::query("DELETE FROM identifier_list_values")
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM identifier_definition")
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM seed_claims")
            .execute(&self.pool)
            .await?;

        info!("Identifier data cleared");
        Ok(())
    }
}
