use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Surrogate key assigned by the store when a row is inserted.
pub type AssignedId = i64;

/// Parent reference linking list values to their definition.
pub type DefinitionRef = i32;

/// The tables this workspace seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    IdentifierDefinition,
    IdentifierListValues,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::IdentifierDefinition => "identifier_definition",
            Table::IdentifierListValues => "identifier_list_values",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IdentifierDefinition {
    pub id: AssignedId,
    pub definition_id: DefinitionRef,
    pub status: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub list_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IdentifierListValue {
    pub id: AssignedId,
    pub definition_id: DefinitionRef,
    pub identifier_value: String,
}

/// A definition row that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIdentifierDefinition {
    pub definition_id: DefinitionRef,
    pub status: String,
    pub list_type: String,
}

/// A list value row that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIdentifierListValue {
    pub definition_id: DefinitionRef,
    pub identifier_value: String,
}

/// Any row the seeder can hand to [`crate::Store::insert_one`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewRecord {
    Definition(NewIdentifierDefinition),
    ListValue(NewIdentifierListValue),
}

impl NewRecord {
    /// The table this record is written to.
    pub fn table(&self) -> Table {
        match self {
            NewRecord::Definition(_) => Table::IdentifierDefinition,
            NewRecord::ListValue(_) => Table::IdentifierListValues,
        }
    }
}

impl From<NewIdentifierDefinition> for NewRecord {
    fn from(definition: NewIdentifierDefinition) -> Self {
        NewRecord::Definition(definition)
    }
}

impl From<NewIdentifierListValue> for NewRecord {
    fn from(value: NewIdentifierListValue) -> Self {
        NewRecord::ListValue(value)
    }
}

/// Proof that a run won the right to seed a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedClaim {
    pub table: Table,
    pub run_id: Uuid,
    pub claimed_at: OffsetDateTime,
}

/// Parameters of the list-value lookup joined through definitions.
///
/// Matches list values whose definition has one of `statuses` and the given
/// `list_type`, and whose own value is one of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListValueQuery {
    pub statuses: Vec<String>,
    pub list_type: String,
    pub values: Vec<String>,
}
