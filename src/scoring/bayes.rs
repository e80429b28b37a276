//! Bayesian scorer
//!
//! Per taxon i and observed trait t the likelihood factor is built in three steps:
//!
//! 1. Beta-Bernoulli smoothing of the agreement strength s:
//!      r  = s·conf + (1-s)·(1-conf)          (annotation trusted with `conf`)
//!      p̂  = (a0 + κ·s + λ·r) / (a0 + b0 + κ + λ)
//! 2. Noise bound into [α, 1-β]:
//!      ℓ  = α + (1-α-β)·p̂                   (α, β swapped for a "No" observation)
//! 3. Outcome adjustment:
//!      Conflict: ℓ · FLOOR^conflictPenalty
//!      Unknown:  γ · ½(ℓ_agree + ℓ_conflict)  (penalty-free marginal)
//!
//! Everything is accumulated in log space; priors enter as ln(prior) and the
//! posterior is a max-shifted softmax, so underflow can never zero a row.

use super::{OutcomeCounts, TaxonScore, PARALLEL_TAXA_THRESHOLD};
use crate::matchers::{match_observation, MatchOutcome, MatchResult};
use crate::matrix::{Matrix, Taxon, Ternary};
use crate::options::{AlgoOptions, NoiseParams};
use crate::selection::{Observation, ResolvedSelection};
use crate::utils::normalize_log_weights;
use rayon::prelude::*;

/// Likelihood multiplier reached at conflictPenalty = 1
pub const CONFLICT_FLOOR: f64 = 1e-6;

/// Lower bound on any single likelihood factor
const MIN_LIKELIHOOD: f64 = 1e-12;

/// Smoothed probability that the observation is true for the taxon
fn smoothed_agreement(strength: f64, confidence: f64, options: &AlgoOptions) -> f64 {
    let s = strength.clamp(0.0, 1.0);
    let denom = options.a0 + options.b0 + options.kappa + options.lambda;
    if denom <= 0.0 {
        return s;
    }
    let r = s * confidence + (1.0 - s) * (1.0 - confidence);
    ((options.a0 + options.kappa * s + options.lambda * r) / denom).clamp(0.0, 1.0)
}

/// Noise-bounded likelihood for a given agreement strength
fn bounded_likelihood(strength: f64, noise: &NoiseParams, negative: bool, options: &AlgoOptions) -> f64 {
    let (alpha, beta) = if negative {
        (noise.beta, noise.alpha)
    } else {
        (noise.alpha, noise.beta)
    };
    let p_hat = smoothed_agreement(strength, noise.confidence, options);
    (alpha + (1.0 - alpha - beta) * p_hat).max(MIN_LIKELIHOOD)
}

/// Log-likelihood contribution of one match result
///
/// # Arguments
/// * `result` - Matcher outcome and strength
/// * `noise` - Resolved α/β/confidence for this (taxon, trait) cell
/// * `negative` - The observation was a binary "No"
/// * `options` - Clamped options
pub fn log_likelihood(result: &MatchResult, noise: &NoiseParams, negative: bool, options: &AlgoOptions) -> f64 {
    match result.outcome {
        MatchOutcome::Agree => bounded_likelihood(result.strength, noise, negative, options).ln(),
        MatchOutcome::Conflict => {
            bounded_likelihood(result.strength, noise, negative, options).ln()
                + options.conflict_penalty * CONFLICT_FLOOR.ln()
        }
        MatchOutcome::Unknown => {
            let agree = bounded_likelihood(1.0, noise, negative, options);
            let conflict = bounded_likelihood(0.0, noise, negative, options);
            (options.gamma_na_penalty * 0.5 * (agree + conflict)).max(MIN_LIKELIHOOD).ln()
        }
    }
}

/// Log raw score and outcome counts for one taxon
fn score_taxon(
    matrix: &Matrix,
    resolved: &ResolvedSelection,
    taxon: &Taxon,
    options: &AlgoOptions,
) -> (f64, OutcomeCounts) {
    let prior = options.prior_for(&taxon.id);
    let mut log_raw = if prior > 0.0 { prior.ln() } else { f64::NEG_INFINITY };
    let mut counts = OutcomeCounts::default();

    for obs in resolved.informative() {
        let t = &matrix.traits[obs.trait_idx];
        let result = match_observation(t, &obs.observation, taxon, options);
        counts.record(&result);

        let noise = options.noise_for(&taxon.id, &t.id);
        let negative = obs.observation == Observation::Binary(Ternary::No);
        log_raw += log_likelihood(&result, &noise, negative, options);
    }

    (log_raw, counts)
}

/// Score every taxon; rows are returned in matrix order
///
/// Posterior is normalized over all taxa; an all-zero (all -inf) raw vector
/// gives the uniform 1/N.
pub fn score_bayes(matrix: &Matrix, resolved: &ResolvedSelection, options: &AlgoOptions) -> Vec<TaxonScore> {
    let rows: Vec<(f64, OutcomeCounts)> = if matrix.n_taxa() >= PARALLEL_TAXA_THRESHOLD {
        matrix
            .taxa
            .par_iter()
            .map(|taxon| score_taxon(matrix, resolved, taxon, options))
            .collect()
    } else {
        matrix
            .taxa
            .iter()
            .map(|taxon| score_taxon(matrix, resolved, taxon, options))
            .collect()
    };

    let log_raw: Vec<f64> = rows.iter().map(|(l, _)| *l).collect();
    if log_raw.iter().all(|l| !l.is_finite()) && !log_raw.is_empty() {
        tracing::debug!("All raw scores are zero, falling back to uniform posterior");
    }
    let post = normalize_log_weights(&log_raw);

    matrix
        .taxa
        .iter()
        .zip(rows)
        .zip(post)
        .map(|((taxon, (_, counts)), p)| TaxonScore {
            taxon_id: taxon.id.clone(),
            taxon_name: taxon.name.clone(),
            post: p,
            delta: 0.0,
            used: counts.support,
            conflicts: counts.conflicts,
            matches: counts.matches,
            support: counts.support,
            excluded: false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{Trait, TraitKind};
    use crate::selection::Selection;
    use approx::assert_relative_eq;

    fn matrix() -> Matrix {
        Matrix::new(
            "bayes",
            vec![
                Trait::new("WINGS", "Wings", TraitKind::Binary),
                Trait::new("LEN", "Length", TraitKind::Continuous),
            ],
            vec![
                Taxon::new("A", "Alpha").with_binary("WINGS", Ternary::Yes).with_range("LEN", 10.0, 20.0),
                Taxon::new("B", "Beta").with_binary("WINGS", Ternary::No).with_range("LEN", 30.0, 40.0),
                Taxon::new("C", "Gamma"),
            ],
        )
    }

    fn post_of(scores: &[TaxonScore], id: &str) -> f64 {
        scores.iter().find(|s| s.taxon_id == id).map(|s| s.post).unwrap()
    }

    #[test]
    fn test_likelihood_ordering() {
        let opts = AlgoOptions::default();
        let noise = opts.noise_for("A", "WINGS");
        let agree = log_likelihood(&MatchResult::agree(1.0), &noise, false, &opts);
        let unknown = log_likelihood(&MatchResult::unknown(), &noise, false, &opts);
        let conflict = log_likelihood(&MatchResult::conflict(0.0), &noise, false, &opts);
        assert!(agree > unknown);
        assert!(unknown > conflict);
    }

    #[test]
    fn test_empty_selection_is_uniform() {
        let m = matrix();
        let scores = score_bayes(&m, &ResolvedSelection::resolve(&m, &Selection::new()), &AlgoOptions::default());
        for s in &scores {
            assert_relative_eq!(s.post, 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_agreeing_taxon_wins() {
        let m = matrix();
        let sel = Selection::new().with_binary("WINGS", Ternary::Yes).with_value("LEN", 15.0);
        let scores = score_bayes(&m, &ResolvedSelection::resolve(&m, &sel), &AlgoOptions::default());

        let total: f64 = scores.iter().map(|s| s.post).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        assert!(post_of(&scores, "A") > post_of(&scores, "C"));
        assert!(post_of(&scores, "C") > post_of(&scores, "B"));

        let a = &scores[0];
        assert_eq!((a.matches, a.conflicts, a.support, a.used), (2, 0, 2, 2));
        let c = &scores[2];
        assert_eq!(c.support, 0);
    }

    #[test]
    fn test_conflict_penalty_is_monotonic() {
        let m = matrix();
        let sel = Selection::new().with_binary("WINGS", Ternary::Yes);
        let resolved = ResolvedSelection::resolve(&m, &sel);

        let mut last = f64::INFINITY;
        for cp in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let opts = AlgoOptions { conflict_penalty: cp, ..Default::default() };
            let p = post_of(&score_bayes(&m, &resolved, &opts), "B");
            assert!(p <= last, "penalty {} raised conflicting posterior", cp);
            last = p;
        }
    }

    #[test]
    fn test_zero_prior_and_uniform_fallback() {
        let m = matrix();
        let mut opts = AlgoOptions::default();
        for id in ["A", "B", "C"] {
            opts.priors.insert(id.into(), 0.0);
        }
        let scores = score_bayes(&m, &ResolvedSelection::resolve(&m, &Selection::new()), &opts);
        for s in &scores {
            assert_relative_eq!(s.post, 1.0 / 3.0, epsilon = 1e-12);
        }

        opts.priors.insert("A".into(), 1.0);
        let scores = score_bayes(&m, &ResolvedSelection::resolve(&m, &Selection::new()), &opts);
        assert_relative_eq!(post_of(&scores, "A"), 1.0, epsilon = 1e-12);
    }
}
