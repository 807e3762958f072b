//! Candidate sets: the pools seeded rows draw their values from.

use std::sync::Arc;

use rand::Rng;
use thiserror::Error;

use crate::config::{CandidateConfig, SeedConfig};

/// Characters used for generated candidate values.
pub const CANDIDATE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CandidateError {
    #[error("Candidate set must contain at least one value")]
    Empty,
    #[error("Candidate values must have a non-zero length")]
    ZeroLength,
}

/// Generates a random uppercase string of exactly `length` characters.
pub fn random_code(length: usize, rng: &mut impl Rng) -> String {
    (0..length)
        .map(|_| CANDIDATE_ALPHABET[rng.gen_range(0..CANDIDATE_ALPHABET.len())] as char)
        .collect()
}

/// A non-empty, immutable pool of values.
///
/// Cloning is cheap: clones share the same backing slice, so a set can be
/// handed to many concurrent inserts without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSet {
    values: Arc<[String]>,
}

impl CandidateSet {
    pub fn new(values: Vec<String>) -> Result<Self, CandidateError> {
        if values.is_empty() {
            return Err(CandidateError::Empty);
        }
        Ok(Self {
            values: values.into(),
        })
    }

    /// Generates `count` random values of `length` characters each.
    pub fn generate(
        count: usize,
        length: usize,
        rng: &mut impl Rng,
    ) -> Result<Self, CandidateError> {
        if length == 0 {
            return Err(CandidateError::ZeroLength);
        }
        Self::new((0..count).map(|_| random_code(length, rng)).collect())
    }

    pub fn from_config(config: &CandidateConfig, rng: &mut impl Rng) -> Result<Self, CandidateError> {
        Self::generate(config.count, config.length, rng)
    }

    /// Picks one value uniformly at random.
    pub fn choose(&self, rng: &mut impl Rng) -> &str {
        // Never empty, so the range is never empty either.
        &self.values[rng.gen_range(0..self.values.len())]
    }

    /// Picks `count` values uniformly at random, with replacement.
    pub fn sample(&self, count: usize, rng: &mut impl Rng) -> Vec<String> {
        (0..count).map(|_| self.choose(rng).to_string()).collect()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The three candidate pools generated once per run.
#[derive(Debug, Clone)]
pub struct RunCandidates {
    pub statuses: CandidateSet,
    pub types: CandidateSet,
    pub identifier_values: CandidateSet,
}

impl RunCandidates {
    pub fn generate(config: &SeedConfig, rng: &mut impl Rng) -> Result<Self, CandidateError> {
        Ok(Self {
            statuses: CandidateSet::from_config(&config.statuses, rng)?,
            types: CandidateSet::from_config(&config.types, rng)?,
            identifier_values: CandidateSet::from_config(&config.identifier_values, rng)?,
        })
    }
}
