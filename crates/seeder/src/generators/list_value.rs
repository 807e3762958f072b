//! List value generation.

use rand::Rng;

use identifiers::{DefinitionRef, NewIdentifierListValue};

use super::candidates::CandidateSet;

/// Generates list values for one parent definition.
///
/// Every generated value is drawn from the generator's candidate set.
#[derive(Debug, Clone)]
pub struct ListValueGenerator {
    definition_id: DefinitionRef,
    candidates: CandidateSet,
}

impl ListValueGenerator {
    pub fn new(definition_id: DefinitionRef, candidates: CandidateSet) -> Self {
        Self {
            definition_id,
            candidates,
        }
    }

    /// Generates a single list value.
    pub fn generate(&self, rng: &mut impl Rng) -> NewIdentifierListValue {
        NewIdentifierListValue {
            definition_id: self.definition_id,
            identifier_value: self.candidates.choose(rng).to_string(),
        }
    }
}
