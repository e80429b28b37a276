//! Algorithm options and their validation
//!
//! `AlgoOptions` is the numeric configuration object sent with every request.
//! Missing fields take documented defaults; `clamp()` folds every value into
//! its safe range. Nothing here ever fails on bad input: out-of-range numbers
//! are corrected and unknown enum strings fall back to the default variant.
//!
//! Per-id overrides (`alphaFP`, `betaFN`, `confidence`, `priors`) are
//! lookup-with-fallback maps: `"taxonId/traitId"` → `traitId` → global default.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Unrecognised string for a string-valued option
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Deserialize through `FromStr`, falling back to `Default` on unknown strings
fn lenient_enum<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = ParseEnumError> + Default,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(match raw {
        Some(s) => s.parse().unwrap_or_else(|e: ParseEnumError| {
            tracing::debug!("{}, using default", e);
            T::default()
        }),
        None => T::default(),
    })
}

/// Same as `lenient_enum` for optional fields (absent / unknown → None)
pub(crate) fn lenient_optional_enum<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = ParseEnumError>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match s.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!("{}, ignoring", e);
            None
        }
    }))
}

// ============================================================================
// Enumerated options
// ============================================================================

/// Rule used to compare categorical state sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoricalAlgo {
    /// Observed states must all be recorded for the taxon
    #[default]
    Binary,
    /// Set similarity against `jaccardThreshold`
    Jaccard,
}

impl FromStr for CategoricalAlgo {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" | "" => Ok(CategoricalAlgo::Binary),
            "jaccard" => Ok(CategoricalAlgo::Jaccard),
            _ => Err(ParseEnumError::new("categorical algorithm", s)),
        }
    }
}

impl<'de> Deserialize<'de> for CategoricalAlgo {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        lenient_enum(d)
    }
}

/// Which gain drives the suggestion score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStrategy {
    MaxIg,
    #[default]
    ExpectedIg,
}

impl FromStr for RecommendationStrategy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max_ig" | "maxig" => Ok(RecommendationStrategy::MaxIg),
            "expected_ig" | "expectedig" | "" => Ok(RecommendationStrategy::ExpectedIg),
            _ => Err(ParseEnumError::new("recommendation strategy", s)),
        }
    }
}

impl<'de> Deserialize<'de> for RecommendationStrategy {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        lenient_enum(d)
    }
}

/// Contradiction handling for the heuristic scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Strict,
    #[default]
    Lenient,
}

impl Mode {
    /// Mode implied by the conflict penalty when the caller does not name one
    pub fn from_conflict_penalty(penalty: f64) -> Self {
        if penalty > 0.5 {
            Mode::Strict
        } else {
            Mode::Lenient
        }
    }
}

impl FromStr for Mode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Mode::Strict),
            "lenient" => Ok(Mode::Lenient),
            _ => Err(ParseEnumError::new("mode", s)),
        }
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        lenient_enum(d)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Strict => "strict",
            Mode::Lenient => "lenient",
        })
    }
}

// ============================================================================
// AlgoOptions
// ============================================================================

/// Numeric configuration for one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlgoOptions {
    /// Probability of reporting a feature the specimen lacks
    #[serde(rename = "defaultAlphaFP")]
    pub default_alpha_fp: f64,
    /// Probability of missing a feature the specimen has
    #[serde(rename = "defaultBetaFN")]
    pub default_beta_fn: f64,
    /// Multiplier applied when the taxon's state is unknown
    #[serde(rename = "gammaNAPenalty")]
    pub gamma_na_penalty: f64,
    pub kappa: f64,
    pub conflict_penalty: f64,
    pub tolerance_factor: f64,
    pub categorical_algo: CategoricalAlgo,
    pub jaccard_threshold: f64,
    pub use_pragmatic_score: bool,
    pub recommendation_strategy: RecommendationStrategy,
    pub apply_dependencies: bool,
    pub want_info_gain: bool,
    pub lambda: f64,
    pub a0: f64,
    pub b0: f64,

    #[serde(rename = "alphaFP", skip_serializing_if = "BTreeMap::is_empty")]
    pub alpha_fp: BTreeMap<String, f64>,
    #[serde(rename = "betaFN", skip_serializing_if = "BTreeMap::is_empty")]
    pub beta_fn: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub confidence: BTreeMap<String, f64>,
    /// Prior weight per taxon id (missing = 1)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub priors: BTreeMap<String, f64>,
}

impl Default for AlgoOptions {
    fn default() -> Self {
        Self {
            default_alpha_fp: 0.03,
            default_beta_fn: 0.07,
            gamma_na_penalty: 0.95,
            kappa: 1.0,
            conflict_penalty: 0.5,
            tolerance_factor: 0.1,
            categorical_algo: CategoricalAlgo::Binary,
            jaccard_threshold: 0.5,
            use_pragmatic_score: false,
            recommendation_strategy: RecommendationStrategy::ExpectedIg,
            apply_dependencies: false,
            want_info_gain: true,
            lambda: 4.0,
            a0: 0.5,
            b0: 0.5,
            alpha_fp: BTreeMap::new(),
            beta_fn: BTreeMap::new(),
            confidence: BTreeMap::new(),
            priors: BTreeMap::new(),
        }
    }
}

/// Fold `v` into [lo, hi]; NaN becomes `fallback`
fn clamp_or(v: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if v.is_nan() {
        fallback
    } else {
        v.clamp(lo, hi)
    }
}

fn clamp_map(map: &mut BTreeMap<String, f64>, lo: f64, hi: f64) {
    map.retain(|_, v| !v.is_nan());
    for v in map.values_mut() {
        *v = v.clamp(lo, hi);
    }
}

impl AlgoOptions {
    /// Load options from a JSON file (missing fields take defaults)
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file: {:?}", path))?;

        let options: AlgoOptions = serde_json::from_str(&contents)
            .with_context(|| "Failed to parse options JSON")?;

        Ok(options.clamp())
    }

    /// Return a copy with every value folded into its safe range
    pub fn clamp(mut self) -> Self {
        let d = AlgoOptions::default();

        self.default_alpha_fp = clamp_or(self.default_alpha_fp, 0.0, 0.2, d.default_alpha_fp);
        self.default_beta_fn = clamp_or(self.default_beta_fn, 0.0, 0.2, d.default_beta_fn);
        self.gamma_na_penalty = clamp_or(self.gamma_na_penalty, 0.8, 1.0, d.gamma_na_penalty);
        self.kappa = clamp_or(self.kappa, 0.0, 5.0, d.kappa);
        self.conflict_penalty = clamp_or(self.conflict_penalty, 0.0, 1.0, d.conflict_penalty);
        self.tolerance_factor = clamp_or(self.tolerance_factor, 0.0, 0.5, d.tolerance_factor);
        self.jaccard_threshold = clamp_or(self.jaccard_threshold, 0.0, 1.0, d.jaccard_threshold);
        self.lambda = clamp_or(self.lambda, 0.0, f64::MAX, d.lambda);
        self.a0 = clamp_or(self.a0, 0.0, f64::MAX, d.a0);
        self.b0 = clamp_or(self.b0, 0.0, f64::MAX, d.b0);

        clamp_map(&mut self.alpha_fp, 0.0, 0.2);
        clamp_map(&mut self.beta_fn, 0.0, 0.2);
        clamp_map(&mut self.confidence, 0.0, 1.0);
        clamp_map(&mut self.priors, 0.0, f64::MAX);

        self
    }

    /// Noise rates for one (taxon, trait) pair
    pub fn noise_for(&self, taxon_id: &str, trait_id: &str) -> NoiseParams {
        NoiseParams {
            alpha: lookup_override(&self.alpha_fp, taxon_id, trait_id, self.default_alpha_fp),
            beta: lookup_override(&self.beta_fn, taxon_id, trait_id, self.default_beta_fn),
            confidence: lookup_override(&self.confidence, taxon_id, trait_id, 1.0),
        }
    }

    /// Prior weight of a taxon (1 when not overridden)
    pub fn prior_for(&self, taxon_id: &str) -> f64 {
        self.priors.get(taxon_id).copied().unwrap_or(1.0)
    }
}

/// Resolved per-cell noise parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseParams {
    pub alpha: f64,
    pub beta: f64,
    /// Trust in the recorded annotation, [0, 1]
    pub confidence: f64,
}

/// Most specific override wins: `"taxonId/traitId"`, then `traitId`, then `fallback`
pub fn lookup_override(map: &BTreeMap<String, f64>, taxon_id: &str, trait_id: &str, fallback: f64) -> f64 {
    if map.is_empty() {
        return fallback;
    }
    let cell_key = format!("{}/{}", taxon_id, trait_id);
    map.get(&cell_key)
        .or_else(|| map.get(trait_id))
        .copied()
        .unwrap_or(fallback)
}
