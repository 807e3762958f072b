//! Storage for identifier definitions and their list values.
//!
//! Two tables are modelled: `identifier_definition` (a status and a type per
//! definition) and `identifier_list_values` (identifier strings hanging off a
//! definition). Both are reached through the [`Store`] trait, implemented by
//! [`Database`] for Postgres and [`MemoryStore`] for in-process runs.

pub mod database;
pub mod errors;
pub mod memory;
pub mod models;
pub mod store;

pub use database::Database;
pub use errors::StorageError;
pub use memory::{FaultKind, MemoryStore};
pub use models::{
    AssignedId, DefinitionRef, IdentifierDefinition, IdentifierListValue, ListValueQuery,
    NewIdentifierDefinition, NewIdentifierListValue, NewRecord, SeedClaim, Table,
};
pub use store::{RowHandler, Store};
