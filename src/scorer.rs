//! Key Scorer - Main coordinator for one evaluation round
//!
//! Validates options, scores every taxon with the requested algorithm, feeds
//! the resulting candidate distribution to the recommender and returns the
//! ranked scores and suggestions. The scorer holds only immutable data (the
//! matrix and default options) and can be shared across threads.
//!
//! Flow per request:
//!   1. clamp options (request options, else scorer defaults)
//!   2. resolve selections against the matrix
//!   3. Bayes posterior or heuristic match ratio per taxon
//!   4. suggestions from the normalized candidate distribution (if wanted)
//!   5. deltas against the caller's previous posterior, then ranking

use crate::justification::{justify, Justification};
use crate::matrix::Matrix;
use crate::options::{lenient_optional_enum, AlgoOptions, Mode};
use crate::recommend::{suggest_traits, TraitSuggestion};
use crate::scoring::{apply_deltas, rank_scores, score_bayes, score_heuristic, Algorithm, TaxonScore};
use crate::selection::{ResolvedSelection, Selection};
use crate::utils::normalize_weights;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

/// One evaluation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    #[serde(flatten)]
    pub selection: Selection,
    /// Heuristic contradiction mode (derived from conflictPenalty when absent)
    #[serde(default, deserialize_with = "lenient_optional_enum", skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub algo: Algorithm,
    /// Falls back to the scorer's default options when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opts: Option<AlgoOptions>,
    /// Posterior from the previous round, by taxon id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<BTreeMap<String, f64>>,
}

impl EvaluateRequest {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            ..Default::default()
        }
    }

    pub fn with_algo(mut self, algo: Algorithm) -> Self {
        self.algo = algo;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_options(mut self, opts: AlgoOptions) -> Self {
        self.opts = Some(opts);
        self
    }

    pub fn with_previous(mut self, previous: BTreeMap<String, f64>) -> Self {
        self.previous = Some(previous);
        self
    }
}

/// Ranked scores and suggestions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    /// Sorted by post desc, then taxon id
    pub scores: Vec<TaxonScore>,
    /// Sorted by score desc, then trait id
    pub suggestions: Vec<TraitSuggestion>,
    pub algo: Algorithm,
    pub mode: Mode,
}

impl EvaluateResult {
    /// Posterior of each taxon by id (the `previous` map for the next round)
    pub fn posterior_map(&self) -> BTreeMap<String, f64> {
        self.scores.iter().map(|s| (s.taxon_id.clone(), s.post)).collect()
    }
}

/// Main evaluation service
pub struct KeyScorer {
    matrix: Matrix,
    defaults: AlgoOptions,
}

impl KeyScorer {
    pub fn new(matrix: Matrix) -> Self {
        Self::with_defaults(matrix, AlgoOptions::default())
    }

    pub fn with_defaults(matrix: Matrix, defaults: AlgoOptions) -> Self {
        Self {
            matrix,
            defaults: defaults.clamp(),
        }
    }

    /// Load the matrix and, optionally, default options from JSON files
    pub fn load(matrix_path: &Path, options_path: Option<&Path>) -> Result<Self> {
        tracing::info!("Loading matrix: {:?}", matrix_path);
        let matrix = Matrix::load(matrix_path)?;
        tracing::info!(
            "Matrix '{}': {} traits, {} taxa",
            matrix.name,
            matrix.traits.len(),
            matrix.n_taxa()
        );

        let defaults = match options_path {
            Some(p) => {
                tracing::info!("Loading default options: {:?}", p);
                AlgoOptions::load(p)?
            }
            None => AlgoOptions::default(),
        };

        Ok(Self::with_defaults(matrix, defaults))
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn defaults(&self) -> &AlgoOptions {
        &self.defaults
    }

    fn options_for(&self, request_opts: Option<&AlgoOptions>) -> AlgoOptions {
        match request_opts {
            Some(o) => o.clone().clamp(),
            None => self.defaults.clone(),
        }
    }

    /// Evaluate one request; never fails
    pub fn evaluate(&self, request: &EvaluateRequest) -> EvaluateResult {
        let start = Instant::now();
        let opts = self.options_for(request.opts.as_ref());
        let result = evaluate_with(&self.matrix, request, &opts);
        tracing::debug!(
            "Evaluated {} taxa / {} suggestions in {:?}",
            result.scores.len(),
            result.suggestions.len(),
            start.elapsed()
        );
        result
    }

    /// Per-trait comparison for one taxon; `None` for an unknown taxon id
    pub fn justify(&self, taxon_id: &str, selection: &Selection, opts: Option<&AlgoOptions>) -> Option<Justification> {
        let opts = self.options_for(opts);
        justify(&self.matrix, taxon_id, selection, &opts)
    }
}

/// Evaluate a request against a matrix with the built-in default options
pub fn evaluate(matrix: &Matrix, request: &EvaluateRequest) -> EvaluateResult {
    let opts = request.opts.clone().unwrap_or_default().clamp();
    evaluate_with(matrix, request, &opts)
}

fn evaluate_with(matrix: &Matrix, request: &EvaluateRequest, opts: &AlgoOptions) -> EvaluateResult {
    let mode = request
        .mode
        .unwrap_or_else(|| Mode::from_conflict_penalty(opts.conflict_penalty));
    let resolved = ResolvedSelection::resolve(matrix, &request.selection);

    tracing::debug!(
        "Scoring with {:?} ({}), {} active observations",
        request.algo,
        mode,
        resolved.informative().count()
    );

    let mut scores = match request.algo {
        Algorithm::Bayes => score_bayes(matrix, &resolved, opts),
        Algorithm::Heuristic => score_heuristic(matrix, &resolved, opts, mode),
    };

    let suggestions = if opts.want_info_gain {
        let posterior: Vec<f64> = match request.algo {
            Algorithm::Bayes => scores.iter().map(|s| s.post).collect(),
            Algorithm::Heuristic => {
                let raw: Vec<f64> = scores.iter().map(|s| s.post).collect();
                normalize_weights(&raw)
            }
        };
        suggest_traits(matrix, &resolved, &posterior, opts)
    } else {
        Vec::new()
    };

    apply_deltas(&mut scores, request.previous.as_ref());
    rank_scores(&mut scores);

    EvaluateResult {
        scores,
        suggestions,
        algo: request.algo,
        mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{Taxon, Ternary, Trait, TraitKind};
    use approx::assert_relative_eq;

    fn scorer() -> KeyScorer {
        KeyScorer::new(Matrix::new(
            "scorer",
            vec![
                Trait::new("WINGS", "Wings", TraitKind::Binary),
                Trait::new("LEGS", "Legs", TraitKind::Binary),
            ],
            vec![
                Taxon::new("A", "Alpha").with_binary("WINGS", Ternary::Yes).with_binary("LEGS", Ternary::Yes),
                Taxon::new("B", "Beta").with_binary("WINGS", Ternary::No).with_binary("LEGS", Ternary::Yes),
            ],
        ))
    }

    #[test]
    fn test_mode_derived_from_conflict_penalty() {
        let s = scorer();
        let req = EvaluateRequest::new(Selection::new()).with_options(AlgoOptions {
            conflict_penalty: 0.9,
            ..Default::default()
        });
        assert_eq!(s.evaluate(&req).mode, Mode::Strict);
        assert_eq!(s.evaluate(&EvaluateRequest::default()).mode, Mode::Lenient);
        assert_eq!(s.evaluate(&req.with_mode(Mode::Lenient)).mode, Mode::Lenient);
    }

    #[test]
    fn test_want_info_gain_off_skips_suggestions() {
        let s = scorer();
        let req = EvaluateRequest::default().with_options(AlgoOptions {
            want_info_gain: false,
            ..Default::default()
        });
        assert!(s.evaluate(&req).suggestions.is_empty());
        assert!(!s.evaluate(&EvaluateRequest::default()).suggestions.is_empty());
    }

    #[test]
    fn test_delta_against_previous() {
        let s = scorer();
        let first = s.evaluate(&EvaluateRequest::default());
        assert!(first.scores.iter().all(|x| x.delta == 0.0));

        let sel = Selection::new().with_binary("WINGS", Ternary::Yes);
        let second = s.evaluate(&EvaluateRequest::new(sel).with_previous(first.posterior_map()));
        let a = &second.scores[0];
        assert_eq!(a.taxon_id, "A");
        assert_relative_eq!(a.delta, a.post - 0.5, epsilon = 1e-12);
        assert!(a.delta > 0.0);
    }

    #[test]
    fn test_heuristic_suggestions_use_normalized_scores() {
        let s = scorer();
        let sel = Selection::new().with_binary("LEGS", Ternary::Yes);
        let r = s.evaluate(&EvaluateRequest::new(sel).with_algo(Algorithm::Heuristic));
        assert_eq!(r.suggestions.len(), 1);
        assert_eq!(r.suggestions[0].trait_id, "WINGS");
        assert_relative_eq!(r.suggestions[0].ig, 1.0, epsilon = 1e-12);
    }
}
