//! Trait matchers
//!
//! One module per trait kind, each comparing a user observation with the
//! taxon's recorded state:
//!   - `binary`:      Yes/No against the recorded ternary (derived children included)
//!   - `continuous`:  measured value against the recorded range widened by a tolerance
//!   - `categorical`: observed state set against the recorded set (containment or Jaccard)
//!
//! A missing recorded state on either side always yields `Unknown`; strength is
//! only meaningful for `Agree` and `Conflict`.

pub mod binary;
pub mod categorical;
pub mod continuous;

pub use binary::match_binary;
pub use categorical::{jaccard_similarity, match_categorical};
pub use continuous::match_continuous;

use crate::matrix::{Taxon, Trait, TraitKind};
use crate::options::AlgoOptions;
use crate::selection::Observation;
use serde::Serialize;

/// Outcome of comparing one observation with one taxon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOutcome {
    Agree,
    Conflict,
    Unknown,
}

/// Outcome plus agreement strength in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub outcome: MatchOutcome,
    pub strength: f64,
}

impl MatchResult {
    pub fn agree(strength: f64) -> Self {
        Self { outcome: MatchOutcome::Agree, strength: strength.clamp(0.0, 1.0) }
    }

    pub fn conflict(strength: f64) -> Self {
        Self { outcome: MatchOutcome::Conflict, strength: strength.clamp(0.0, 1.0) }
    }

    pub fn unknown() -> Self {
        Self { outcome: MatchOutcome::Unknown, strength: 0.0 }
    }

    pub fn is_agree(&self) -> bool {
        self.outcome == MatchOutcome::Agree
    }

    pub fn is_conflict(&self) -> bool {
        self.outcome == MatchOutcome::Conflict
    }
}

/// Dispatch one observation to the matcher for the trait's kind
///
/// Shape mismatches (e.g. a numeric observation on a categorical trait) and
/// NA marks are reported as `Unknown`.
pub fn match_observation(
    t: &Trait,
    observation: &Observation,
    taxon: &Taxon,
    options: &AlgoOptions,
) -> MatchResult {
    match (t.kind, observation) {
        (TraitKind::Binary | TraitKind::Derived, Observation::Binary(obs)) => {
            match_binary(*obs, taxon.binary_state(&t.id))
        }
        (TraitKind::Continuous, Observation::Continuous(value)) => match taxon.range(&t.id) {
            Some(range) => match_continuous(*value, range, t.declared_range(), options.tolerance_factor),
            None => MatchResult::unknown(),
        },
        (TraitKind::CategoricalSingle | TraitKind::CategoricalMulti, Observation::Categorical(states)) => {
            match taxon.states(&t.id) {
                Some(recorded) => match_categorical(
                    states.as_slice(),
                    recorded,
                    options.categorical_algo,
                    options.jaccard_threshold,
                ),
                None => MatchResult::unknown(),
            }
        }
        _ => MatchResult::unknown(),
    }
}
