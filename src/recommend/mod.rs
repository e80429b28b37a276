//! Next-trait recommender
//!
//! Ranks every unobserved trait (derived groups collapsed to their parent) by
//! how much answering it is expected to narrow the candidate posterior.
//!
//! score = gain × dependency factor, where gain is `ig` (expected_ig) or
//! `max_ig` (max_ig). With `usePragmaticScore`:
//!   score = gain / (max(difficulty, 0.1) · max(1 - risk, 0.05))
//!
//! Dependency factor (only with `applyDependencies`):
//!   - parent observed in the required state: 1
//!   - parent observed in another state:      0
//!   - parent unresolved: P(parent = required state) from the parent's pStates

pub mod state_model;

pub use state_model::{build_candidates, Candidate, CandidateStats, CONTINUOUS_BINS};

use crate::matrix::{Dependency, Matrix, Ternary};
use crate::options::{AlgoOptions, RecommendationStrategy};
use crate::selection::{Observation, ResolvedSelection};
use crate::utils::shannon_entropy;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Candidate count at which the per-trait loop moves to rayon
pub(crate) const PARALLEL_TRAITS_THRESHOLD: usize = 64;

const MIN_DIFFICULTY: f64 = 0.1;
const MIN_CONFIDENCE: f64 = 0.05;

/// Probability of one answer state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateProb {
    pub state: String,
    pub p: f64,
}

/// One ranked suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitSuggestion {
    pub trait_id: String,
    pub name: String,
    pub group: String,
    /// Expected entropy reduction (bits)
    pub ig: f64,
    /// Best single-outcome entropy reduction (bits)
    #[serde(rename = "max_ig")]
    pub max_ig: f64,
    /// Expected fractional shrinkage of the effective candidate count
    pub ecr: f64,
    pub gini: f64,
    pub entropy: f64,
    pub p_states: SmallVec<[StateProb; 4]>,
    pub score: f64,
    pub difficulty: f64,
    pub risk: f64,
    pub known_fraction: f64,
}

/// Parent state relative to a dependency
#[derive(Debug, Clone, Copy, PartialEq)]
enum ParentStatus {
    Satisfied,
    Contradicted,
    Unresolved,
    /// Observed but not comparable (NA mark or continuous parent)
    Indeterminate,
}

fn same_state(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn parent_status(matrix: &Matrix, resolved: &ResolvedSelection, dep: &Dependency) -> ParentStatus {
    let pid = dep.parent_trait_id.trim();
    let verdict = |ok: bool| if ok { ParentStatus::Satisfied } else { ParentStatus::Contradicted };

    if let Some(idx) = matrix.traits.iter().position(|t| t.id == pid) {
        if !matrix.child_indices(pid).is_empty() && resolved.observation_for(idx).is_none() {
            // Parent row that doubles as a derived group header
            return derived_parent_status(matrix, resolved, dep);
        }
        return match resolved.observation_for(idx) {
            None => ParentStatus::Unresolved,
            Some(Observation::Binary(state)) => verdict(same_state(state.label(), &dep.required_state)),
            Some(Observation::Categorical(states)) => {
                verdict(states.iter().any(|s| same_state(s, &dep.required_state)))
            }
            Some(Observation::Continuous(_)) | Some(Observation::NotApplicable) => ParentStatus::Indeterminate,
        };
    }

    if matrix.child_indices(pid).is_empty() {
        tracing::debug!("Dependency parent '{}' not found in matrix", pid);
        return ParentStatus::Indeterminate;
    }
    derived_parent_status(matrix, resolved, dep)
}

fn derived_parent_status(matrix: &Matrix, resolved: &ResolvedSelection, dep: &Dependency) -> ParentStatus {
    let pid = dep.parent_trait_id.trim();
    let chosen: Vec<&str> = matrix
        .child_indices(pid)
        .iter()
        .filter(|&&i| resolved.observation_for(i) == Some(&Observation::Binary(Ternary::Yes)))
        .map(|&i| matrix.traits[i].state_label())
        .collect();

    if !chosen.is_empty() {
        return if chosen.iter().any(|s| same_state(s, &dep.required_state)) {
            ParentStatus::Satisfied
        } else {
            ParentStatus::Contradicted
        };
    }
    if resolved.is_observed(pid) {
        return ParentStatus::Indeterminate;
    }
    ParentStatus::Unresolved
}

/// Dependency weight for one candidate
fn dependency_factor(
    matrix: &Matrix,
    resolved: &ResolvedSelection,
    candidates: &[Candidate<'_>],
    stats: &[CandidateStats],
    dep: &Dependency,
) -> f64 {
    match parent_status(matrix, resolved, dep) {
        ParentStatus::Satisfied | ParentStatus::Indeterminate => 1.0,
        ParentStatus::Contradicted => 0.0,
        ParentStatus::Unresolved => {
            let pid = dep.parent_trait_id.trim();
            let Some(pos) = candidates.iter().position(|c| c.id == pid) else {
                return 1.0;
            };
            let parent = &candidates[pos];
            let parent_stats = &stats[pos];
            if parent_stats.known_fraction <= 0.0 {
                return 1.0;
            }
            match parent.states.iter().position(|s| same_state(s, &dep.required_state)) {
                Some(j) => parent_stats.p_states[j],
                None => {
                    tracing::debug!(
                        "Required state '{}' not found on parent '{}'",
                        dep.required_state,
                        pid
                    );
                    1.0
                }
            }
        }
    }
}

fn pragmatic_divisor(difficulty: f64, risk: f64) -> f64 {
    let difficulty = if difficulty.is_finite() { difficulty.max(MIN_DIFFICULTY) } else { 1.0 };
    let risk = if risk.is_finite() { risk.clamp(0.0, 1.0) } else { 0.5 };
    difficulty * (1.0 - risk).max(MIN_CONFIDENCE)
}

/// Rank unobserved traits under the current candidate distribution
///
/// # Arguments
/// * `matrix` - Trait matrix
/// * `resolved` - Current observations
/// * `posterior` - Normalized weight per taxon, in matrix order
/// * `options` - Clamped options
pub fn suggest_traits(
    matrix: &Matrix,
    resolved: &ResolvedSelection,
    posterior: &[f64],
    options: &AlgoOptions,
) -> Vec<TraitSuggestion> {
    let candidates = build_candidates(matrix, resolved);
    if candidates.is_empty() || posterior.len() != matrix.n_taxa() {
        return Vec::new();
    }

    let prior_entropy = shannon_entropy(posterior);
    let stats: Vec<CandidateStats> = if candidates.len() >= PARALLEL_TRAITS_THRESHOLD {
        candidates.par_iter().map(|c| c.stats(posterior, prior_entropy)).collect()
    } else {
        candidates.iter().map(|c| c.stats(posterior, prior_entropy)).collect()
    };

    let mut suggestions: Vec<TraitSuggestion> = candidates
        .iter()
        .zip(&stats)
        .map(|(c, s)| {
            let factor = match (options.apply_dependencies, c.dependency) {
                (true, Some(dep)) => dependency_factor(matrix, resolved, &candidates, &stats, dep),
                _ => 1.0,
            };
            let ig = s.ig * factor;
            let max_ig = s.max_ig * factor;

            let gain = match options.recommendation_strategy {
                RecommendationStrategy::ExpectedIg => ig,
                RecommendationStrategy::MaxIg => max_ig,
            };
            let score = if options.use_pragmatic_score {
                gain / pragmatic_divisor(c.difficulty, c.risk)
            } else {
                gain
            };

            TraitSuggestion {
                trait_id: c.id.clone(),
                name: c.name.clone(),
                group: c.group.clone(),
                ig,
                max_ig,
                ecr: s.ecr,
                gini: s.gini,
                entropy: s.entropy,
                p_states: c
                    .states
                    .iter()
                    .zip(&s.p_states)
                    .map(|(state, &p)| StateProb { state: state.clone(), p })
                    .collect(),
                score,
                difficulty: c.difficulty,
                risk: c.risk,
                known_fraction: s.known_fraction,
            }
        })
        .collect();

    suggestions.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.trait_id.cmp(&b.trait_id)));

    tracing::debug!(
        "Ranked {} candidate traits (entropy {:.3} bits)",
        suggestions.len(),
        prior_entropy
    );
    suggestions
}
