//! Trait Matrix - reference taxa × characters
//!
//! Holds the immutable trait definitions and per-taxon recorded states that
//! every evaluation reads. The matrix is supplied by an external loader; this
//! module only deserializes the JSON interchange shape and builds id indexes.
//!
//! Recorded states:
//!   - binary / derived: `Ternary` (-1 = No, 0 = unknown, 1 = Yes)
//!   - continuous: `NumericRange` [min, max] (taxon's known range)
//!   - categorical: subset of the trait's `states`
//!
//! A trait missing from a taxon's maps is "unknown", never an implicit No.

use anyhow::{Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;

/// Recorded or observed yes/no state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i8", into = "i8")]
pub enum Ternary {
    No,
    #[default]
    Unknown,
    Yes,
}

impl From<i8> for Ternary {
    fn from(v: i8) -> Self {
        match v {
            v if v > 0 => Ternary::Yes,
            v if v < 0 => Ternary::No,
            _ => Ternary::Unknown,
        }
    }
}

impl From<Ternary> for i8 {
    fn from(t: Ternary) -> Self {
        match t {
            Ternary::No => -1,
            Ternary::Unknown => 0,
            Ternary::Yes => 1,
        }
    }
}

impl Ternary {
    pub fn is_known(self) -> bool {
        self != Ternary::Unknown
    }

    pub fn label(self) -> &'static str {
        match self {
            Ternary::Yes => "Yes",
            Ternary::No => "No",
            Ternary::Unknown => "NA",
        }
    }
}

/// Closed numeric interval recorded for a continuous trait
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

impl NumericRange {
    /// Build a range, swapping reversed bounds
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    pub fn span(&self) -> f64 {
        (self.max - self.min).abs()
    }

    pub fn overlaps(&self, lo: f64, hi: f64) -> bool {
        self.min <= hi && self.max >= lo
    }
}

/// Declared kind of a trait (tagged variant, no subclassing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    Binary,
    Continuous,
    #[serde(alias = "nominal", alias = "ordinal")]
    CategoricalSingle,
    CategoricalMulti,
    Derived,
}

impl TraitKind {
    pub fn is_categorical(self) -> bool {
        matches!(self, TraitKind::CategoricalSingle | TraitKind::CategoricalMulti)
    }

    /// Kinds whose selection arrives in the ternary `selected` map
    pub fn is_ternary(self) -> bool {
        matches!(self, TraitKind::Binary | TraitKind::Derived)
    }
}

/// Prerequisite: the trait is only meaningful when the parent is in `required_state`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub parent_trait_id: String,
    pub required_state: String,
}

/// Immutable trait (character) definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trait {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group: String,
    #[serde(rename = "type")]
    pub kind: TraitKind,
    /// Logical parent group for derived children
    #[serde(default, rename = "parent", alias = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Display label of the state a derived child stands for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default = "default_difficulty", deserialize_with = "deserialize_difficulty")]
    pub difficulty: f64,
    #[serde(default = "default_risk", deserialize_with = "deserialize_risk")]
    pub risk: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub is_integer: bool,
    /// Allowed states (categorical only)
    #[serde(default, rename = "states", skip_serializing_if = "Vec::is_empty")]
    pub allowed_states: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency: Option<Dependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

impl Trait {
    /// Shorthand constructor used by tests and synthetic matrices
    pub fn new(id: &str, name: &str, kind: TraitKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            group: String::new(),
            kind,
            parent_id: None,
            state: None,
            difficulty: default_difficulty(),
            risk: default_risk(),
            min_value: None,
            max_value: None,
            is_integer: false,
            allowed_states: Vec::new(),
            dependency: None,
            help_text: None,
        }
    }

    /// Declared [minValue, maxValue], if both bounds are present
    pub fn declared_range(&self) -> Option<NumericRange> {
        match (self.min_value, self.max_value) {
            (Some(lo), Some(hi)) => Some(NumericRange::new(lo, hi)),
            _ => None,
        }
    }

    /// Label of the state a derived child represents
    pub fn state_label(&self) -> &str {
        match &self.state {
            Some(s) if !s.is_empty() => s,
            _ if !self.name.is_empty() => &self.name,
            _ => &self.id,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Reference taxon with its recorded states
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taxon {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub traits: FxHashMap<String, Ternary>,
    #[serde(default)]
    pub continuous_traits: FxHashMap<String, NumericRange>,
    #[serde(default)]
    pub categorical_traits: FxHashMap<String, Vec<String>>,
}

impl Taxon {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_binary(mut self, trait_id: &str, state: Ternary) -> Self {
        self.traits.insert(trait_id.to_string(), state);
        self
    }

    pub fn with_range(mut self, trait_id: &str, min: f64, max: f64) -> Self {
        self.continuous_traits
            .insert(trait_id.to_string(), NumericRange::new(min, max));
        self
    }

    pub fn with_states(mut self, trait_id: &str, states: &[&str]) -> Self {
        self.categorical_traits.insert(
            trait_id.to_string(),
            states.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Recorded binary state (missing = Unknown)
    pub fn binary_state(&self, trait_id: &str) -> Ternary {
        self.traits.get(trait_id).copied().unwrap_or_default()
    }

    pub fn range(&self, trait_id: &str) -> Option<NumericRange> {
        self.continuous_traits.get(trait_id).copied()
    }

    /// Recorded categorical states; an empty list counts as unknown
    pub fn states(&self, trait_id: &str) -> Option<&[String]> {
        self.categorical_traits
            .get(trait_id)
            .map(|v| v.as_slice())
            .filter(|v| !v.is_empty())
    }
}

/// JSON interchange shape of a matrix
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MatrixDef {
    #[serde(default)]
    name: String,
    #[serde(default)]
    traits: Vec<Trait>,
    #[serde(default)]
    taxa: Vec<Taxon>,
}

/// Read-only trait matrix with id indexes
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "MatrixDef")]
pub struct Matrix {
    pub name: String,
    pub traits: Vec<Trait>,
    pub taxa: Vec<Taxon>,
    trait_index: FxHashMap<String, usize>,
    taxon_index: FxHashMap<String, usize>,
    /// parent id → derived child trait indices, in matrix order
    children_by_parent: FxHashMap<String, Vec<usize>>,
}

impl From<MatrixDef> for Matrix {
    fn from(def: MatrixDef) -> Self {
        Matrix::new(def.name, def.traits, def.taxa)
    }
}

impl Matrix {
    /// Build indexes; the first occurrence of a duplicated id wins
    ///
    /// A derived child whose parent names no trait id but matches the name
    /// of a non-derived trait is re-pointed at that trait's id.
    pub fn new(name: impl Into<String>, mut traits: Vec<Trait>, mut taxa: Vec<Taxon>) -> Self {
        resolve_parent_names(&mut traits);

        let mut trait_index = FxHashMap::default();
        let mut children_by_parent: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (idx, t) in traits.iter().enumerate() {
            trait_index.entry(t.id.clone()).or_insert(idx);
            if t.kind == TraitKind::Derived {
                if let Some(parent) = t.parent_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
                    children_by_parent.entry(parent.to_string()).or_default().push(idx);
                }
            }
        }

        let mut taxon_index = FxHashMap::default();
        for (idx, tx) in taxa.iter_mut().enumerate() {
            taxon_index.entry(tx.id.clone()).or_insert(idx);
            for r in tx.continuous_traits.values_mut() {
                *r = NumericRange::new(r.min, r.max);
            }
        }

        Self {
            name: name.into(),
            traits,
            taxa,
            trait_index,
            taxon_index,
            children_by_parent,
        }
    }

    /// Load matrix from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read matrix file: {:?}", path))?;

        Self::from_json_str(&contents)
            .with_context(|| format!("Failed to parse matrix JSON: {:?}", path))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let matrix: Matrix = serde_json::from_str(json)?;
        Ok(matrix)
    }

    pub fn trait_by_id(&self, id: &str) -> Option<&Trait> {
        self.trait_index.get(id).map(|&i| &self.traits[i])
    }

    pub fn taxon_by_id(&self, id: &str) -> Option<&Taxon> {
        self.taxon_index.get(id).map(|&i| &self.taxa[i])
    }

    /// Trait indices of the derived children of a parent group, in matrix order
    pub fn child_indices(&self, parent_id: &str) -> &[usize] {
        self.children_by_parent
            .get(parent_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn children_of(&self, parent_id: &str) -> impl Iterator<Item = &Trait> {
        self.child_indices(parent_id).iter().map(move |&i| &self.traits[i])
    }

    /// Parent ids of all derived groups, in order of first appearance
    pub fn derived_parents(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for t in &self.traits {
            if t.kind != TraitKind::Derived {
                continue;
            }
            if let Some(p) = t.parent_id.as_deref().map(str::trim) {
                if self.children_by_parent.contains_key(p) && !seen.contains(&p) {
                    seen.push(p);
                }
            }
        }
        seen
    }

    pub fn n_taxa(&self) -> usize {
        self.taxa.len()
    }
}

fn resolve_parent_names(traits: &mut [Trait]) {
    let ids: FxHashSet<String> = traits.iter().map(|t| t.id.clone()).collect();
    let mut id_by_name: FxHashMap<String, String> = FxHashMap::default();
    for t in traits.iter().filter(|t| t.kind != TraitKind::Derived && !t.name.trim().is_empty()) {
        id_by_name.entry(t.name.trim().to_string()).or_insert_with(|| t.id.clone());
    }

    for t in traits.iter_mut().filter(|t| t.kind == TraitKind::Derived) {
        let Some(parent) = t.parent_id.as_deref().map(str::trim) else {
            continue;
        };
        if parent.is_empty() || ids.contains(parent) {
            continue;
        }
        if let Some(id) = id_by_name.get(parent) {
            tracing::debug!("Derived trait '{}' parent '{}' matched by name to '{}'", t.id, parent, id);
            t.parent_id = Some(id.clone());
        }
    }
}

// ============================================================================
// Difficulty / risk vocabulary
// ============================================================================

fn default_difficulty() -> f64 {
    1.0
}

fn default_risk() -> f64 {
    0.5
}

/// Observation difficulty: Easy 0.5, Normal 1, Hard 2, Very Hard 3, or a positive number
pub fn parse_difficulty(s: &str) -> f64 {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "easy" => 0.5,
        "normal" | "" => 1.0,
        "hard" => 2.0,
        "very hard" => 3.0,
        other => match other.parse::<f64>() {
            Ok(v) if v > 0.0 => v,
            _ => 1.0,
        },
    }
}

/// Misjudgement risk: Lowest 0, Low 0.2, Medium 0.5, High 0.8, Highest 1, or a number in [0,1]
pub fn parse_risk(s: &str) -> f64 {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "lowest" => 0.0,
        "low" => 0.2,
        "medium" | "" => 0.5,
        "high" => 0.8,
        "highest" => 1.0,
        other => match other.parse::<f64>() {
            Ok(v) if (0.0..=1.0).contains(&v) => v,
            _ => 0.5,
        },
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RankValue {
    Number(f64),
    Label(String),
}

fn deserialize_difficulty<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(match Option::<RankValue>::deserialize(d)? {
        Some(RankValue::Number(v)) if v > 0.0 => v,
        Some(RankValue::Number(_)) | None => default_difficulty(),
        Some(RankValue::Label(s)) => parse_difficulty(&s),
    })
}

fn deserialize_risk<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(match Option::<RankValue>::deserialize(d)? {
        Some(RankValue::Number(v)) if (0.0..=1.0).contains(&v) => v,
        Some(RankValue::Number(_)) | None => default_risk(),
        Some(RankValue::Label(s)) => parse_risk(&s),
    })
}
