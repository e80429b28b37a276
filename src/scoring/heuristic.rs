//! Heuristic scorer
//!
//! score = matches / max(1, support), where support counts observations with a
//! definite outcome. Strict mode rules a taxon out on its first conflict
//! (score 0, `excluded`); lenient mode lets conflicts simply not count.
//! Priors and noise parameters play no part here.

use super::{OutcomeCounts, TaxonScore, PARALLEL_TAXA_THRESHOLD};
use crate::matchers::match_observation;
use crate::matrix::{Matrix, Taxon};
use crate::options::{AlgoOptions, Mode};
use crate::selection::ResolvedSelection;
use rayon::prelude::*;

fn count_taxon(matrix: &Matrix, resolved: &ResolvedSelection, taxon: &Taxon, options: &AlgoOptions) -> OutcomeCounts {
    let mut counts = OutcomeCounts::default();
    for obs in resolved.informative() {
        let t = &matrix.traits[obs.trait_idx];
        counts.record(&match_observation(t, &obs.observation, taxon, options));
    }
    counts
}

/// Score every taxon by match ratio; rows are returned in matrix order
pub fn score_heuristic(
    matrix: &Matrix,
    resolved: &ResolvedSelection,
    options: &AlgoOptions,
    mode: Mode,
) -> Vec<TaxonScore> {
    let counts: Vec<OutcomeCounts> = if matrix.n_taxa() >= PARALLEL_TAXA_THRESHOLD {
        matrix
            .taxa
            .par_iter()
            .map(|taxon| count_taxon(matrix, resolved, taxon, options))
            .collect()
    } else {
        matrix
            .taxa
            .iter()
            .map(|taxon| count_taxon(matrix, resolved, taxon, options))
            .collect()
    };

    matrix
        .taxa
        .iter()
        .zip(counts)
        .map(|(taxon, c)| {
            let excluded = mode == Mode::Strict && c.conflicts > 0;
            let score = if excluded {
                0.0
            } else {
                c.matches as f64 / c.support.max(1) as f64
            };
            TaxonScore {
                taxon_id: taxon.id.clone(),
                taxon_name: taxon.name.clone(),
                post: score,
                delta: 0.0,
                used: c.support,
                conflicts: c.conflicts,
                matches: c.matches,
                support: c.support,
                excluded,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{Ternary, Trait, TraitKind};
    use crate::selection::Selection;
    use approx::assert_relative_eq;

    fn matrix() -> Matrix {
        Matrix::new(
            "heuristic",
            vec![
                Trait::new("WINGS", "Wings", TraitKind::Binary),
                Trait::new("LEGS", "Legs", TraitKind::Binary),
            ],
            vec![
                Taxon::new("A", "Alpha").with_binary("WINGS", Ternary::Yes).with_binary("LEGS", Ternary::Yes),
                Taxon::new("B", "Beta").with_binary("WINGS", Ternary::Yes).with_binary("LEGS", Ternary::No),
                Taxon::new("C", "Gamma").with_binary("WINGS", Ternary::Yes),
            ],
        )
    }

    fn selection() -> Selection {
        Selection::new().with_binary("WINGS", Ternary::Yes).with_binary("LEGS", Ternary::Yes)
    }

    #[test]
    fn test_strict_excludes_on_conflict() {
        let m = matrix();
        let r = ResolvedSelection::resolve(&m, &selection());
        let scores = score_heuristic(&m, &r, &AlgoOptions::default(), Mode::Strict);

        assert_relative_eq!(scores[0].post, 1.0);
        assert!(scores[1].excluded);
        assert_eq!(scores[1].post, 0.0);
        assert_eq!(scores[1].conflicts, 1);
        // Unknown LEGS does not count against C
        assert_relative_eq!(scores[2].post, 1.0);
        assert_eq!(scores[2].support, 1);
    }

    #[test]
    fn test_lenient_keeps_partial_ratio() {
        let m = matrix();
        let r = ResolvedSelection::resolve(&m, &selection());
        let scores = score_heuristic(&m, &r, &AlgoOptions::default(), Mode::Lenient);
        assert!(!scores[1].excluded);
        assert_relative_eq!(scores[1].post, 0.5);
    }

    #[test]
    fn test_no_observations_scores_zero() {
        let m = matrix();
        let r = ResolvedSelection::resolve(&m, &Selection::new());
        let scores = score_heuristic(&m, &r, &AlgoOptions::default(), Mode::Strict);
        assert!(scores.iter().all(|s| s.post == 0.0 && !s.excluded));
    }
}
