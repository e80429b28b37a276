//! User selections and their resolution against the matrix
//!
//! The caller accumulates three sparse maps across a session:
//!   - `selected`:      trait id → number (-1/0/1 for binary/derived, the measured value for continuous)
//!   - `selectedMulti`: trait id → chosen states (categorical)
//!   - `selectedNA`:    trait id → "observed as indeterminate"
//!
//! `ResolvedSelection::resolve` turns these into typed observations in matrix
//! order. Unknown ids and selections whose shape does not fit the trait kind are
//! dropped for that trait only; derived children are expanded so that choosing
//! one state implies No for its siblings.

use crate::matrix::{Matrix, Ternary, TraitKind};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller-owned accumulated selections (passed by value into each evaluation)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(default)]
    pub selected: BTreeMap<String, f64>,
    #[serde(default)]
    pub selected_multi: BTreeMap<String, Vec<String>>,
    #[serde(default, rename = "selectedNA")]
    pub selected_na: BTreeMap<String, bool>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(mut self, trait_id: &str, state: Ternary) -> Self {
        self.selected.insert(trait_id.to_string(), i8::from(state) as f64);
        self
    }

    pub fn with_value(mut self, trait_id: &str, value: f64) -> Self {
        self.selected.insert(trait_id.to_string(), value);
        self
    }

    pub fn with_states(mut self, trait_id: &str, states: &[&str]) -> Self {
        self.selected_multi.insert(
            trait_id.to_string(),
            states.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn with_na(mut self, trait_id: &str) -> Self {
        self.selected_na.insert(trait_id.to_string(), true);
        self
    }

    fn is_marked_na(&self, id: &str) -> bool {
        self.selected_na.get(id).copied().unwrap_or(false)
    }
}

/// One typed observation for one trait
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Binary(Ternary),
    Continuous(f64),
    Categorical(Vec<String>),
    /// Observed, but the user could not decide
    NotApplicable,
}

impl Observation {
    pub fn is_informative(&self) -> bool {
        !matches!(self, Observation::NotApplicable)
    }
}

/// Observation bound to a trait index
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedTrait {
    pub trait_idx: usize,
    pub observation: Observation,
    /// Set when the state was implied by a sibling choice in a derived group
    pub implied: bool,
}

/// Selections resolved against one matrix
#[derive(Debug, Clone, Default)]
pub struct ResolvedSelection {
    /// Observations ordered by trait index
    pub observations: Vec<ObservedTrait>,
    /// Ids counted as already observed (including NA marks and derived parents)
    pub observed_ids: FxHashSet<String>,
    /// Selection entries that were ignored as malformed
    pub ignored: usize,
}

impl ResolvedSelection {
    pub fn resolve(matrix: &Matrix, selection: &Selection) -> Self {
        let mut by_idx: BTreeMap<usize, ObservedTrait> = BTreeMap::new();
        let mut observed_ids = FxHashSet::default();
        let mut ignored = 0usize;

        // Derived groups marked NA through their parent id
        for (id, &flag) in &selection.selected_na {
            if !flag || matrix.trait_by_id(id).is_some() {
                continue;
            }
            let children = matrix.child_indices(id);
            if children.is_empty() {
                tracing::debug!("Ignoring NA mark for unknown trait '{}'", id);
                ignored += 1;
                continue;
            }
            observed_ids.insert(id.clone());
            for &idx in children {
                observed_ids.insert(matrix.traits[idx].id.clone());
                by_idx.insert(idx, ObservedTrait { trait_idx: idx, observation: Observation::NotApplicable, implied: false });
            }
        }

        for (idx, t) in matrix.traits.iter().enumerate() {
            // Explicit NA wins over any value sent for the same id
            if selection.is_marked_na(&t.id) {
                observed_ids.insert(t.id.clone());
                by_idx.insert(idx, ObservedTrait { trait_idx: idx, observation: Observation::NotApplicable, implied: false });
                continue;
            }

            let observation = match t.kind {
                TraitKind::Binary | TraitKind::Derived => match selection.selected.get(&t.id) {
                    Some(&v) if v.is_finite() && v != 0.0 => {
                        Some(Observation::Binary(if v > 0.0 { Ternary::Yes } else { Ternary::No }))
                    }
                    _ => None,
                },
                TraitKind::Continuous => match selection.selected.get(&t.id) {
                    Some(&v) if v.is_finite() => {
                        Some(Observation::Continuous(if t.is_integer { v.round() } else { v }))
                    }
                    Some(_) => {
                        ignored += 1;
                        None
                    }
                    None => None,
                },
                TraitKind::CategoricalSingle | TraitKind::CategoricalMulti => {
                    selection.selected_multi.get(&t.id).and_then(|states| {
                        let mut states: Vec<String> = states
                            .iter()
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect();
                        states.sort();
                        states.dedup();
                        (!states.is_empty()).then_some(Observation::Categorical(states))
                    })
                }
            };

            if let Some(observation) = observation {
                observed_ids.insert(t.id.clone());
                by_idx.insert(idx, ObservedTrait { trait_idx: idx, observation, implied: false });
            }
        }

        ignored += count_shape_mismatches(matrix, selection);

        // Choosing one state of a derived group rules out the siblings
        for parent in matrix.derived_parents() {
            let children = matrix.child_indices(parent);
            let chosen = children.iter().any(|i| {
                matches!(by_idx.get(i), Some(o) if o.observation == Observation::Binary(Ternary::Yes))
            });
            if !chosen {
                continue;
            }

            observed_ids.insert(parent.to_string());
            for &i in children {
                by_idx.entry(i).or_insert_with(|| ObservedTrait {
                    trait_idx: i,
                    observation: Observation::Binary(Ternary::No),
                    implied: true,
                });
                observed_ids.insert(matrix.traits[i].id.clone());
            }
        }

        if ignored > 0 {
            tracing::debug!("Ignored {} malformed selection entries", ignored);
        }

        Self {
            observations: by_idx.into_values().collect(),
            observed_ids,
            ignored,
        }
    }

    /// Observations that carry information (NA marks excluded)
    pub fn informative(&self) -> impl Iterator<Item = &ObservedTrait> {
        self.observations.iter().filter(|o| o.observation.is_informative())
    }

    pub fn is_observed(&self, trait_id: &str) -> bool {
        self.observed_ids.contains(trait_id)
    }

    pub fn observation_for(&self, trait_idx: usize) -> Option<&Observation> {
        self.observations
            .binary_search_by_key(&trait_idx, |o| o.trait_idx)
            .ok()
            .map(|i| &self.observations[i].observation)
    }
}

/// Entries naming unknown traits or using the wrong map for the trait kind
fn count_shape_mismatches(matrix: &Matrix, selection: &Selection) -> usize {
    let mut n = 0;
    for id in selection.selected.keys() {
        match matrix.trait_by_id(id) {
            Some(t) if t.kind.is_ternary() || t.kind == TraitKind::Continuous => {}
            _ => {
                tracing::debug!("Ignoring numeric selection for '{}'", id);
                n += 1;
            }
        }
    }
    for id in selection.selected_multi.keys() {
        match matrix.trait_by_id(id) {
            Some(t) if t.kind.is_categorical() => {}
            _ => {
                tracing::debug!("Ignoring state selection for '{}'", id);
                n += 1;
            }
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{Taxon, Trait};

    fn matrix() -> Matrix {
        let mut red = Trait::new("C_RED", "red", TraitKind::Derived);
        red.parent_id = Some("COLOR".into());
        let mut black = Trait::new("C_BLACK", "black", TraitKind::Derived);
        black.parent_id = Some("COLOR".into());
        let mut green = Trait::new("C_GREEN", "green", TraitKind::Derived);
        green.parent_id = Some("COLOR".into());
        let mut len = Trait::new("LEN", "Length", TraitKind::Continuous);
        len.is_integer = true;
        let mut hab = Trait::new("HAB", "Habitat", TraitKind::CategoricalMulti);
        hab.allowed_states = vec!["forest".into(), "meadow".into()];

        Matrix::new(
            "test",
            vec![Trait::new("WINGS", "Wings", TraitKind::Binary), red, black, green, len, hab],
            vec![Taxon::new("A", "Alpha")],
        )
    }

    #[test]
    fn test_derived_choice_implies_siblings_no() {
        let m = matrix();
        let sel = Selection::new().with_binary("C_RED", Ternary::Yes);
        let r = ResolvedSelection::resolve(&m, &sel);

        assert_eq!(r.observations.len(), 3);
        assert_eq!(r.observation_for(1), Some(&Observation::Binary(Ternary::Yes)));
        assert_eq!(r.observation_for(2), Some(&Observation::Binary(Ternary::No)));
        assert_eq!(r.observation_for(3), Some(&Observation::Binary(Ternary::No)));
        assert!(r.observations[1].implied);
        assert!(r.is_observed("COLOR"));
    }

    #[test]
    fn test_explicit_sibling_choice_is_kept() {
        let m = matrix();
        let sel = Selection::new()
            .with_binary("C_RED", Ternary::Yes)
            .with_binary("C_BLACK", Ternary::Yes);
        let r = ResolvedSelection::resolve(&m, &sel);
        assert_eq!(r.observation_for(2), Some(&Observation::Binary(Ternary::Yes)));
        assert_eq!(r.observation_for(3), Some(&Observation::Binary(Ternary::No)));
    }

    #[test]
    fn test_unset_and_malformed_entries_are_dropped() {
        let m = matrix();
        let sel = Selection::new()
            .with_value("WINGS", 0.0)
            .with_value("NOPE", 1.0)
            .with_states("WINGS", &["x"])
            .with_states("HAB", &[]);
        let r = ResolvedSelection::resolve(&m, &sel);
        assert!(r.observations.is_empty());
        assert_eq!(r.ignored, 2);
    }

    #[test]
    fn test_integer_trait_rounds_value() {
        let m = matrix();
        let r = ResolvedSelection::resolve(&m, &Selection::new().with_value("LEN", 4.6));
        assert_eq!(r.observation_for(4), Some(&Observation::Continuous(5.0)));
    }

    #[test]
    fn test_na_mark_on_group_parent() {
        let m = matrix();
        let r = ResolvedSelection::resolve(&m, &Selection::new().with_na("COLOR"));
        assert!(r.is_observed("COLOR"));
        assert_eq!(r.informative().count(), 0);
        assert_eq!(r.observations.len(), 3);
    }

    #[test]
    fn test_categorical_states_normalized() {
        let m = matrix();
        let r = ResolvedSelection::resolve(&m, &Selection::new().with_states("HAB", &["meadow", " forest", "meadow"]));
        assert_eq!(
            r.observation_for(5),
            Some(&Observation::Categorical(vec!["forest".into(), "meadow".into()]))
        );
    }
}
