//! Identifier definition generation.

use rand::Rng;

use identifiers::{DefinitionRef, NewIdentifierDefinition};

use super::candidates::CandidateSet;

/// Generates definitions sharing one definition id, each with a status and
/// a type drawn from their own candidate sets.
#[derive(Debug, Clone)]
pub struct DefinitionGenerator {
    definition_id: DefinitionRef,
    statuses: CandidateSet,
    types: CandidateSet,
}

impl DefinitionGenerator {
    pub fn new(definition_id: DefinitionRef, statuses: CandidateSet, types: CandidateSet) -> Self {
        Self {
            definition_id,
            statuses,
            types,
        }
    }

    /// Generates a single definition.
    pub fn generate(&self, rng: &mut impl Rng) -> NewIdentifierDefinition {
        NewIdentifierDefinition {
            definition_id: self.definition_id,
            status: self.statuses.choose(rng).to_string(),
            list_type: self.types.choose(rng).to_string(),
        }
    }
}
