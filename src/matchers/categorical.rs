//! Categorical matching
//!
//! Two algorithms:
//!   - binary:  Agree iff the observed set is a non-empty subset of the recorded set
//!   - jaccard: similarity |O∩T| / |O∪T| compared with a threshold (inclusive)

use super::MatchResult;
use crate::options::CategoricalAlgo;

/// |a ∩ b| / |a ∪ b| over distinct, case-sensitive labels (0 when both empty)
pub fn jaccard_similarity<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> f64 {
    let a: rustc_hash::FxHashSet<&str> = a.iter().map(|s| s.as_ref()).collect();
    let b: rustc_hash::FxHashSet<&str> = b.iter().map(|s| s.as_ref()).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Match observed states against the taxon's recorded states
pub fn match_categorical<A: AsRef<str>, B: AsRef<str>>(
    observed: &[A],
    recorded: &[B],
    algo: CategoricalAlgo,
    jaccard_threshold: f64,
) -> MatchResult {
    if observed.is_empty() || recorded.is_empty() {
        return MatchResult::unknown();
    }

    match algo {
        CategoricalAlgo::Binary => {
            let contained = observed
                .iter()
                .all(|o| recorded.iter().any(|r| r.as_ref() == o.as_ref()));
            if contained {
                MatchResult::agree(1.0)
            } else {
                MatchResult::conflict(0.0)
            }
        }
        CategoricalAlgo::Jaccard => {
            let similarity = jaccard_similarity(observed, recorded);
            if similarity >= jaccard_threshold {
                MatchResult::agree(similarity)
            } else {
                MatchResult::conflict(similarity)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::MatchOutcome;
    use approx::assert_relative_eq;

    #[test]
    fn test_containment_rule() {
        let rec = ["forest", "meadow"];
        assert!(match_categorical(&["forest"], &rec, CategoricalAlgo::Binary, 0.5).is_agree());
        assert!(match_categorical(&["forest", "meadow"], &rec, CategoricalAlgo::Binary, 0.5).is_agree());
        assert!(match_categorical(&["forest", "swamp"], &rec, CategoricalAlgo::Binary, 0.5).is_conflict());
    }

    #[test]
    fn test_jaccard_boundary() {
        let obs = ["A", "B"];
        let rec = ["A", "C"];
        assert_relative_eq!(jaccard_similarity(&obs, &rec), 1.0 / 3.0);

        let strict = match_categorical(&obs, &rec, CategoricalAlgo::Jaccard, 0.34);
        assert_eq!(strict.outcome, MatchOutcome::Conflict);
        assert_relative_eq!(strict.strength, 1.0 / 3.0);

        let loose = match_categorical(&obs, &rec, CategoricalAlgo::Jaccard, 0.33);
        assert_eq!(loose.outcome, MatchOutcome::Agree);
    }

    #[test]
    fn test_empty_sets_are_unknown() {
        let empty: [&str; 0] = [];
        assert_eq!(
            match_categorical(&["A"], &empty, CategoricalAlgo::Binary, 0.5).outcome,
            MatchOutcome::Unknown
        );
        assert_eq!(jaccard_similarity(&empty, &empty), 0.0);
    }
}
