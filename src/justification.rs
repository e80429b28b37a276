//! Per-taxon justification ("why is this taxon ranked here?")
//!
//! Lists every trait for one taxon with the user's choice and the taxon's
//! recorded state rendered as display strings. Derived children are collapsed
//! into one row per group, keyed by the parent id.

use crate::matchers::{match_observation, MatchOutcome};
use crate::matrix::{Matrix, NumericRange, Taxon, Ternary, Trait, TraitKind};
use crate::options::AlgoOptions;
use crate::selection::{Observation, ResolvedSelection, Selection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Display text for an indeterminate choice
const NA_LABEL: &str = "N/A";
const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JustificationStatus {
    Match,
    Conflict,
    /// Observed, but the taxon's state is unknown
    Neutral,
    Unobserved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JustificationItem {
    pub trait_id: String,
    pub trait_name: String,
    pub trait_group_name: String,
    pub user_choice: String,
    pub taxon_state: String,
    pub status: JustificationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Justification {
    pub taxon_id: String,
    pub taxon_name: String,
    pub matches: Vec<JustificationItem>,
    pub conflicts: Vec<JustificationItem>,
    pub neutral: Vec<JustificationItem>,
    pub unobserved: Vec<JustificationItem>,
    pub match_count: usize,
    pub conflict_count: usize,
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn format_range(r: NumericRange) -> String {
    if r.min == r.max {
        format_number(r.min)
    } else {
        format!("{} - {}", format_number(r.min), format_number(r.max))
    }
}

fn ternary_text(t: Ternary) -> &'static str {
    match t {
        Ternary::Unknown => UNKNOWN_LABEL,
        known => known.label(),
    }
}

fn observation_text(obs: &Observation) -> String {
    match obs {
        Observation::Binary(t) => ternary_text(*t).to_string(),
        Observation::Continuous(v) => format_number(*v),
        Observation::Categorical(states) => states.join(", "),
        Observation::NotApplicable => NA_LABEL.to_string(),
    }
}

fn taxon_text(t: &Trait, taxon: &Taxon) -> String {
    match t.kind {
        TraitKind::Binary | TraitKind::Derived => ternary_text(taxon.binary_state(&t.id)).to_string(),
        TraitKind::Continuous => taxon
            .range(&t.id)
            .map(format_range)
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        TraitKind::CategoricalSingle | TraitKind::CategoricalMulti => taxon
            .states(&t.id)
            .map(|s| s.join(", "))
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
    }
}

fn status_of(outcome: MatchOutcome) -> JustificationStatus {
    match outcome {
        MatchOutcome::Agree => JustificationStatus::Match,
        MatchOutcome::Conflict => JustificationStatus::Conflict,
        MatchOutcome::Unknown => JustificationStatus::Neutral,
    }
}

fn trait_item(
    t: &Trait,
    taxon: &Taxon,
    observation: Option<&Observation>,
    options: &AlgoOptions,
) -> JustificationItem {
    let (user_choice, status) = match observation {
        None => (String::new(), JustificationStatus::Unobserved),
        Some(Observation::NotApplicable) => (NA_LABEL.to_string(), JustificationStatus::Unobserved),
        Some(obs) => (
            observation_text(obs),
            status_of(match_observation(t, obs, taxon, options).outcome),
        ),
    };
    JustificationItem {
        trait_id: t.id.clone(),
        trait_name: t.display_name().to_string(),
        trait_group_name: t.group.clone(),
        user_choice,
        taxon_state: taxon_text(t, taxon),
        status,
    }
}

fn group_item(
    matrix: &Matrix,
    parent: &str,
    taxon: &Taxon,
    resolved: &ResolvedSelection,
    options: &AlgoOptions,
) -> Option<JustificationItem> {
    let children = matrix.child_indices(parent);
    let first = &matrix.traits[*children.first()?];
    let header = matrix.trait_by_id(parent);

    let chosen: Vec<&str> = children
        .iter()
        .filter(|&&i| resolved.observation_for(i) == Some(&Observation::Binary(Ternary::Yes)))
        .map(|&i| matrix.traits[i].state_label())
        .collect();
    let recorded: Vec<&str> = children
        .iter()
        .filter(|&&i| taxon.binary_state(&matrix.traits[i].id) == Ternary::Yes)
        .map(|&i| matrix.traits[i].state_label())
        .collect();

    let marked_na = children
        .iter()
        .any(|&i| resolved.observation_for(i) == Some(&Observation::NotApplicable));

    let (user_choice, status) = if marked_na {
        (NA_LABEL.to_string(), JustificationStatus::Unobserved)
    } else if chosen.is_empty() {
        (String::new(), JustificationStatus::Unobserved)
    } else {
        let mut any_agree = false;
        let mut any_conflict = false;
        for &i in children {
            if let Some(obs) = resolved.observation_for(i) {
                match match_observation(&matrix.traits[i], obs, taxon, options).outcome {
                    MatchOutcome::Agree => any_agree = true,
                    MatchOutcome::Conflict => any_conflict = true,
                    MatchOutcome::Unknown => {}
                }
            }
        }
        let status = if any_conflict {
            JustificationStatus::Conflict
        } else if any_agree {
            JustificationStatus::Match
        } else {
            JustificationStatus::Neutral
        };
        (chosen.join(", "), status)
    };

    Some(JustificationItem {
        trait_id: parent.to_string(),
        trait_name: header.map(|h| h.display_name().to_string()).unwrap_or_else(|| parent.to_string()),
        trait_group_name: header.unwrap_or(first).group.clone(),
        user_choice,
        taxon_state: if recorded.is_empty() {
            UNKNOWN_LABEL.to_string()
        } else {
            recorded.join(", ")
        },
        status,
    })
}

/// Explain how one taxon compares with the current selection
///
/// # Arguments
/// * `matrix` - Trait matrix
/// * `taxon_id` - Taxon to explain
/// * `selection` - Accumulated user selections
/// * `options` - Options used for tolerance and categorical matching
pub fn justify(
    matrix: &Matrix,
    taxon_id: &str,
    selection: &Selection,
    options: &AlgoOptions,
) -> Option<Justification> {
    let taxon = matrix.taxon_by_id(taxon_id)?;
    let options = options.clone().clamp();
    let resolved = ResolvedSelection::resolve(matrix, selection);

    let mut items = Vec::new();
    let mut seen_groups: BTreeSet<&str> = BTreeSet::new();

    for (idx, t) in matrix.traits.iter().enumerate() {
        if t.kind == TraitKind::Derived {
            if let Some(parent) = t.parent_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
                if seen_groups.insert(parent) {
                    items.extend(group_item(matrix, parent, taxon, &resolved, &options));
                }
            }
            continue;
        }
        if !matrix.child_indices(&t.id).is_empty() {
            // Group header rows are reported through their children
            continue;
        }
        items.push(trait_item(t, taxon, resolved.observation_for(idx), &options));
    }

    let mut out = Justification {
        taxon_id: taxon.id.clone(),
        taxon_name: taxon.name.clone(),
        matches: Vec::new(),
        conflicts: Vec::new(),
        neutral: Vec::new(),
        unobserved: Vec::new(),
        match_count: 0,
        conflict_count: 0,
    };
    for item in items {
        match item.status {
            JustificationStatus::Match => out.matches.push(item),
            JustificationStatus::Conflict => out.conflicts.push(item),
            JustificationStatus::Neutral => out.neutral.push(item),
            JustificationStatus::Unobserved => out.unobserved.push(item),
        }
    }
    out.match_count = out.matches.len();
    out.conflict_count = out.conflicts.len();
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> Matrix {
        let mut red = Trait::new("C_RED", "Color red", TraitKind::Derived);
        red.parent_id = Some("COLOR".into());
        red.state = Some("red".into());
        let mut black = Trait::new("C_BLACK", "Color black", TraitKind::Derived);
        black.parent_id = Some("COLOR".into());
        black.state = Some("black".into());

        Matrix::new(
            "why",
            vec![
                Trait::new("WINGS", "Wings", TraitKind::Binary),
                Trait::new("LEN", "Length", TraitKind::Continuous),
                Trait::new("SPOTS", "Spots", TraitKind::Binary),
                red,
                black,
            ],
            vec![Taxon::new("A", "Alpha")
                .with_binary("WINGS", Ternary::Yes)
                .with_range("LEN", 10.0, 20.0)
                .with_binary("C_BLACK", Ternary::Yes)],
        )
    }

    #[test]
    fn test_justification_buckets() {
        let m = matrix();
        let sel = Selection::new()
            .with_binary("WINGS", Ternary::Yes)
            .with_value("LEN", 50.0)
            .with_binary("SPOTS", Ternary::No)
            .with_binary("C_RED", Ternary::Yes);
        let j = justify(&m, "A", &sel, &AlgoOptions::default()).unwrap();

        assert_eq!(j.match_count, 1);
        assert_eq!(j.matches[0].trait_id, "WINGS");
        assert_eq!(j.conflict_count, 2);
        assert_eq!(j.conflicts[0].trait_id, "LEN");
        assert_eq!(j.conflicts[0].taxon_state, "10 - 20");
        assert_eq!(j.conflicts[1].trait_id, "COLOR");
        assert_eq!(j.conflicts[1].user_choice, "red");
        assert_eq!(j.conflicts[1].taxon_state, "black");
        assert_eq!(j.neutral.len(), 1);
        assert_eq!(j.neutral[0].taxon_state, "Unknown");
        assert!(j.unobserved.is_empty());
    }

    #[test]
    fn test_unobserved_and_unknown_taxon() {
        let m = matrix();
        let j = justify(&m, "A", &Selection::new(), &AlgoOptions::default()).unwrap();
        assert_eq!(j.unobserved.len(), 4);
        assert!(justify(&m, "ZZ", &Selection::new(), &AlgoOptions::default()).is_none());
    }
}
