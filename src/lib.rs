//! Taxon Key Scorer
//!
//! Scoring and recommendation engine for interactive identification keys.
//! Given a reference trait matrix (taxa × characters) and the observations a
//! user has made so far, each evaluation re-ranks every taxon and suggests the
//! unobserved trait that would best narrow the candidates.
//!
//! Module layout:
//! - `matrix`: Trait/taxon model and JSON loading
//! - `selection`: User selections resolved into typed observations
//! - `options`: Algorithm options, defaults and clamping
//! - `matchers/`: Per trait-kind match rules
//! - `scoring/`: Bayesian and heuristic taxon scorers
//! - `recommend/`: Information-gain trait recommender
//! - `scorer`: Evaluation service tying the above together
//! - `justification`: Per-taxon match/conflict breakdown
//! - `utils/`: Normalization and entropy helpers

pub mod utils;
pub mod matrix;
pub mod selection;
pub mod options;
pub mod matchers;
pub mod scoring;
pub mod recommend;
pub mod justification;
pub mod scorer;

#[cfg(feature = "api")]
pub mod api_server;

// Re-export commonly used types
pub use matrix::{Dependency, Matrix, NumericRange, Taxon, Ternary, Trait, TraitKind, parse_difficulty, parse_risk};
pub use selection::{Observation, ResolvedSelection, Selection};
pub use options::{AlgoOptions, CategoricalAlgo, Mode, NoiseParams, ParseEnumError, RecommendationStrategy, lookup_override};
pub use matchers::{MatchOutcome, MatchResult, jaccard_similarity, match_binary, match_categorical, match_continuous, match_observation};
pub use scoring::{Algorithm, TaxonScore, score_bayes, score_heuristic};
pub use recommend::{StateProb, TraitSuggestion, suggest_traits};
pub use justification::{Justification, JustificationItem, JustificationStatus, justify};
pub use scorer::{EvaluateRequest, EvaluateResult, KeyScorer, evaluate};

#[cfg(feature = "api")]
pub use api_server::{AppState, AppError, create_router};
