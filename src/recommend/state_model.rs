//! Candidate traits and their outcome model
//!
//! Every unobserved trait is turned into a small multi-state question:
//!   - binary:      {Yes, No}
//!   - continuous:  4 equal-width bins over the declared (or observed) range
//!   - categorical: the allowed states
//!   - derived:     one state per child, keyed by the group's parent id
//!
//! For each taxon we record the set of states compatible with its data, or
//! `None` when the data is missing. The answer model is
//!   L(s | i) = 1/|compatible_i|  if s is compatible with taxon i
//!            = 1/k               for a taxon with unknown data
//! so every row sums to one and the expected information gain is a mutual
//! information, hence never negative.

use crate::matrix::{Dependency, Matrix, NumericRange, Ternary, Trait, TraitKind};
use crate::selection::ResolvedSelection;
use crate::utils::{gini_impurity, shannon_entropy};
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// Number of bins used for continuous traits
pub const CONTINUOUS_BINS: usize = 4;

/// Indices of the states compatible with one taxon
pub type Compatible = SmallVec<[usize; 4]>;

/// One unobserved trait (or derived group) framed as a multi-state question
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub id: String,
    pub name: String,
    pub group: String,
    pub states: Vec<String>,
    /// Per taxon, in matrix order
    pub compatible: Vec<Option<Compatible>>,
    pub difficulty: f64,
    pub risk: f64,
    pub dependency: Option<&'a Dependency>,
}

/// Information statistics of one candidate under the current posterior
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateStats {
    /// Known-only state distribution (sums to 1 when any taxon is known)
    pub p_states: Vec<f64>,
    pub known_fraction: f64,
    pub entropy: f64,
    pub gini: f64,
    pub ig: f64,
    pub max_ig: f64,
    pub ecr: f64,
}

// ============================================================================
// Candidate enumeration
// ============================================================================

/// Build all candidates for the traits not yet observed, in matrix order
///
/// Derived groups appear at the position of their first child. Questions with
/// fewer than two states are skipped.
pub fn build_candidates<'a>(matrix: &'a Matrix, resolved: &ResolvedSelection) -> Vec<Candidate<'a>> {
    let mut out = Vec::new();
    let mut seen_groups: BTreeSet<&str> = BTreeSet::new();

    for t in &matrix.traits {
        let candidate = match t.kind {
            TraitKind::Derived => {
                let Some(parent) = t.parent_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) else {
                    continue;
                };
                if !seen_groups.insert(parent) {
                    continue;
                }
                if group_observed(matrix, resolved, parent) {
                    continue;
                }
                derived_candidate(matrix, parent)
            }
            // Group header rows are asked through their derived children
            _ if !matrix.child_indices(&t.id).is_empty() => continue,
            _ if resolved.is_observed(&t.id) => continue,
            TraitKind::Binary => Some(binary_candidate(matrix, t)),
            TraitKind::Continuous => continuous_candidate(matrix, t),
            TraitKind::CategoricalSingle | TraitKind::CategoricalMulti => categorical_candidate(matrix, t),
        };

        if let Some(c) = candidate.filter(|c| c.states.len() >= 2) {
            out.push(c);
        }
    }
    out
}

fn group_observed(matrix: &Matrix, resolved: &ResolvedSelection, parent: &str) -> bool {
    resolved.is_observed(parent) || matrix.children_of(parent).any(|c| resolved.is_observed(&c.id))
}

fn base_candidate<'a>(t: &'a Trait, states: Vec<String>, compatible: Vec<Option<Compatible>>) -> Candidate<'a> {
    Candidate {
        id: t.id.clone(),
        name: t.display_name().to_string(),
        group: t.group.clone(),
        states,
        compatible,
        difficulty: t.difficulty,
        risk: t.risk,
        dependency: t.dependency.as_ref(),
    }
}

fn binary_candidate<'a>(matrix: &Matrix, t: &'a Trait) -> Candidate<'a> {
    let compatible = matrix
        .taxa
        .iter()
        .map(|taxon| match taxon.binary_state(&t.id) {
            Ternary::Yes => Some(Compatible::from_slice(&[0])),
            Ternary::No => Some(Compatible::from_slice(&[1])),
            Ternary::Unknown => None,
        })
        .collect();
    base_candidate(t, vec![Ternary::Yes.label().to_string(), Ternary::No.label().to_string()], compatible)
}

fn format_edge(v: f64) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Equal-width bin edges over the declared range, else over the union of taxon ranges
pub fn continuous_edges(matrix: &Matrix, t: &Trait) -> Option<Vec<f64>> {
    let range = t.declared_range().or_else(|| {
        matrix
            .taxa
            .iter()
            .filter_map(|taxon| taxon.range(&t.id))
            .filter(|r| r.min.is_finite() && r.max.is_finite())
            .reduce(|a, b| NumericRange::new(a.min.min(b.min), a.max.max(b.max)))
    })?;

    if range.span() <= 0.0 || !range.span().is_finite() {
        return None;
    }
    let width = range.span() / CONTINUOUS_BINS as f64;
    Some((0..=CONTINUOUS_BINS).map(|j| range.min + width * j as f64).collect())
}

/// Bins overlapped by a recorded range; ranges outside the edges are clamped in
fn bins_for_range(edges: &[f64], range: NumericRange) -> Compatible {
    let lo_edge = edges[0];
    let hi_edge = edges[edges.len() - 1];
    let a = range.min.clamp(lo_edge, hi_edge);
    let b = range.max.clamp(lo_edge, hi_edge);
    let last = edges.len() - 2;

    (0..=last)
        .filter(|&j| {
            let (lo, hi) = (edges[j], edges[j + 1]);
            if j == last {
                b >= lo && a <= hi
            } else {
                b >= lo && a < hi
            }
        })
        .collect()
}

fn continuous_candidate<'a>(matrix: &Matrix, t: &'a Trait) -> Option<Candidate<'a>> {
    let edges = continuous_edges(matrix, t)?;
    let states = edges
        .windows(2)
        .enumerate()
        .map(|(j, w)| {
            let close = if j + 2 == edges.len() { "]" } else { ")" };
            format!("[{}, {}{}", format_edge(w[0]), format_edge(w[1]), close)
        })
        .collect();

    let compatible = matrix
        .taxa
        .iter()
        .map(|taxon| {
            taxon
                .range(&t.id)
                .filter(|r| r.min.is_finite() && r.max.is_finite())
                .map(|r| bins_for_range(&edges, r))
                .filter(|bins| !bins.is_empty())
        })
        .collect();
    Some(base_candidate(t, states, compatible))
}

fn categorical_candidate<'a>(matrix: &Matrix, t: &'a Trait) -> Option<Candidate<'a>> {
    let states: Vec<String> = if t.allowed_states.is_empty() {
        let union: BTreeSet<&String> = matrix
            .taxa
            .iter()
            .filter_map(|taxon| taxon.states(&t.id))
            .flatten()
            .collect();
        union.into_iter().cloned().collect()
    } else {
        t.allowed_states.clone()
    };
    if states.is_empty() {
        return None;
    }

    let compatible = matrix
        .taxa
        .iter()
        .map(|taxon| {
            let recorded = taxon.states(&t.id)?;
            let idx: Compatible = states
                .iter()
                .enumerate()
                .filter(|(_, s)| recorded.contains(*s))
                .map(|(j, _)| j)
                .collect();
            (!idx.is_empty()).then_some(idx)
        })
        .collect();
    Some(base_candidate(t, states, compatible))
}

fn derived_candidate<'a>(matrix: &'a Matrix, parent: &str) -> Option<Candidate<'a>> {
    let children: Vec<&Trait> = matrix.children_of(parent).collect();
    let first = *children.first()?;
    let parent_trait = matrix.trait_by_id(parent);
    let meta = parent_trait.unwrap_or(first);

    let states = children.iter().map(|c| c.state_label().to_string()).collect();
    let compatible = matrix
        .taxa
        .iter()
        .map(|taxon| {
            let recorded: Vec<Ternary> = children.iter().map(|c| taxon.binary_state(&c.id)).collect();
            let yes: Compatible = (0..children.len()).filter(|&j| recorded[j] == Ternary::Yes).collect();
            if !yes.is_empty() {
                return Some(yes);
            }
            if !recorded.contains(&Ternary::No) {
                return None;
            }
            let open: Compatible = (0..children.len()).filter(|&j| recorded[j] != Ternary::No).collect();
            (!open.is_empty()).then_some(open)
        })
        .collect();

    Some(Candidate {
        id: parent.to_string(),
        name: parent_trait.map(|p| p.display_name().to_string()).unwrap_or_else(|| parent.to_string()),
        group: meta.group.clone(),
        states,
        compatible,
        difficulty: meta.difficulty,
        risk: meta.risk,
        dependency: meta.dependency.as_ref(),
    })
}

// ============================================================================
// Outcome statistics
// ============================================================================

impl Candidate<'_> {
    /// L(s | i) for one taxon
    fn answer_likelihood(&self, taxon_idx: usize, state: usize) -> f64 {
        match &self.compatible[taxon_idx] {
            Some(c) if c.contains(&state) => 1.0 / c.len() as f64,
            Some(_) => 0.0,
            None => 1.0 / self.states.len() as f64,
        }
    }

    /// Entropy, impurity and gains of this question under `posterior`
    ///
    /// # Arguments
    /// * `posterior` - Normalized candidate distribution, in matrix taxon order
    /// * `prior_entropy` - Shannon entropy (bits) of `posterior`
    pub fn stats(&self, posterior: &[f64], prior_entropy: f64) -> CandidateStats {
        let k = self.states.len();
        let mut p_answer = vec![0.0; k];
        let mut p_known = vec![0.0; k];
        let mut known_fraction = 0.0;

        for (i, &w) in posterior.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            let known = self.compatible[i].is_some();
            if known {
                known_fraction += w;
            }
            for s in 0..k {
                let l = w * self.answer_likelihood(i, s);
                p_answer[s] += l;
                if known {
                    p_known[s] += l;
                }
            }
        }

        let mut expected_entropy = 0.0;
        let mut expected_perplexity = 0.0;
        let mut max_ig = 0.0_f64;
        let mut conditioned = vec![0.0; posterior.len()];

        for s in 0..k {
            if p_answer[s] <= 0.0 {
                continue;
            }
            for (i, &w) in posterior.iter().enumerate() {
                conditioned[i] = if w > 0.0 { w * self.answer_likelihood(i, s) } else { 0.0 };
            }
            let h = shannon_entropy(&conditioned);
            expected_entropy += p_answer[s] * h;
            expected_perplexity += p_answer[s] * h.exp2();
            max_ig = max_ig.max(prior_entropy - h);
        }

        let ig = (prior_entropy - expected_entropy).max(0.0);
        let ecr = (1.0 - expected_perplexity / prior_entropy.exp2()).max(0.0);

        let p_states = if known_fraction > 0.0 {
            p_known.iter().map(|p| p / known_fraction).collect()
        } else {
            vec![0.0; k]
        };

        CandidateStats {
            entropy: shannon_entropy(&p_known),
            gini: gini_impurity(&p_known),
            p_states,
            known_fraction,
            ig,
            max_ig: max_ig.max(0.0),
            ecr,
        }
    }
}
