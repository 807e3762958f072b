//! Row generators for seeding.
//!
//! - [`CandidateSet`]: fixed pool of random values drawn from by seeded rows
//! - [`DefinitionGenerator`]: identifier definitions with a status and a type
//! - [`ListValueGenerator`]: list values pointing at one definition

pub mod candidates;
pub mod definition;
pub mod list_value;

pub use candidates::{CandidateError, CandidateSet, RunCandidates, random_code};
pub use definition::DefinitionGenerator;
pub use list_value::ListValueGenerator;
