//! Taxon scoring
//!
//! Two interchangeable scorers over the same resolved observations:
//!   - `bayes`:     posterior plausibility under a noisy-observation model
//!   - `heuristic`: match ratio with strict/lenient contradiction handling
//!
//! Both return one `TaxonScore` per taxon in matrix order; `rank_scores`
//! applies the reported ordering (post desc, then taxon id asc).

pub mod bayes;
pub mod heuristic;

pub use bayes::score_bayes;
pub use heuristic::score_heuristic;

use crate::matchers::{MatchOutcome, MatchResult};
use crate::options::ParseEnumError;
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Taxa count at which per-taxon loops move to rayon
pub(crate) const PARALLEL_TAXA_THRESHOLD: usize = 256;

/// Which scorer ranks the taxa
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Bayes,
    Heuristic,
}

impl FromStr for Algorithm {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bayes" | "" => Ok(Algorithm::Bayes),
            "heuristic" => Ok(Algorithm::Heuristic),
            _ => Err(ParseEnumError {
                kind: "algorithm",
                value: s.to_string(),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw
            .and_then(|s| match s.parse() {
                Ok(a) => Some(a),
                Err(e) => {
                    tracing::debug!("{}, using bayes", e);
                    None
                }
            })
            .unwrap_or_default())
    }
}

/// Per-taxon result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonScore {
    pub taxon_id: String,
    pub taxon_name: String,
    /// Posterior (bayes) or match ratio (heuristic)
    pub post: f64,
    /// Change since the caller-supplied previous result (0 without one)
    pub delta: f64,
    /// Observations that produced a definite outcome
    pub used: usize,
    pub conflicts: usize,
    #[serde(rename = "match")]
    pub matches: usize,
    pub support: usize,
    /// Ruled out by a contradiction in strict heuristic mode
    #[serde(default)]
    pub excluded: bool,
}

/// Agree/conflict/definite counts for one taxon
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct OutcomeCounts {
    pub matches: usize,
    pub conflicts: usize,
    pub support: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, result: &MatchResult) {
        match result.outcome {
            MatchOutcome::Agree => {
                self.matches += 1;
                self.support += 1;
            }
            MatchOutcome::Conflict => {
                self.conflicts += 1;
                self.support += 1;
            }
            MatchOutcome::Unknown => {}
        }
    }
}

/// Sort by post desc, non-excluded first at equal post, then taxon id asc
pub fn rank_scores(scores: &mut [TaxonScore]) {
    scores.sort_by(ranking_order);
}

/// Fill `delta` from a previous taxonId → post map
pub fn apply_deltas(scores: &mut [TaxonScore], previous: Option<&BTreeMap<String, f64>>) {
    for s in scores.iter_mut() {
        s.delta = match previous.and_then(|p| p.get(&s.taxon_id)) {
            Some(prev) if prev.is_finite() => s.post - prev,
            _ => 0.0,
        };
    }
}

pub fn ranking_order(a: &TaxonScore, b: &TaxonScore) -> Ordering {
    b.post
        .total_cmp(&a.post)
        .then(a.excluded.cmp(&b.excluded))
        .then_with(|| a.taxon_id.cmp(&b.taxon_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, post: f64, excluded: bool) -> TaxonScore {
        TaxonScore {
            taxon_id: id.into(),
            taxon_name: id.into(),
            post,
            delta: 0.0,
            used: 0,
            conflicts: 0,
            matches: 0,
            support: 0,
            excluded,
        }
    }

    #[test]
    fn test_rank_ties_by_id() {
        let mut scores = vec![row("B", 0.5, false), row("A", 0.5, false), row("C", 0.9, false)];
        rank_scores(&mut scores);
        let ids: Vec<_> = scores.iter().map(|s| s.taxon_id.as_str()).collect();
        assert_eq!(ids, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_excluded_sorts_last_on_tie() {
        let mut scores = vec![row("A", 0.0, true), row("B", 0.0, false)];
        rank_scores(&mut scores);
        assert_eq!(scores[0].taxon_id, "B");
    }

    #[test]
    fn test_deltas() {
        let mut scores = vec![row("A", 0.6, false), row("B", 0.4, false)];
        let mut prev = BTreeMap::new();
        prev.insert("A".to_string(), 0.5);
        apply_deltas(&mut scores, Some(&prev));
        assert!((scores[0].delta - 0.1).abs() < 1e-12);
        assert_eq!(scores[1].delta, 0.0);
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("Heuristic".parse::<Algorithm>().unwrap(), Algorithm::Heuristic);
        let a: Algorithm = serde_json::from_str("\"neural\"").unwrap();
        assert_eq!(a, Algorithm::Bayes);
    }
}
