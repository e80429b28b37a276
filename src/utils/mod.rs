//! Utility modules shared by the scorers and the recommender
//!
//! - Normalization: log-space softmax and weight normalization with uniform fallback
//! - Entropy: Shannon entropy (bits) and Gini impurity over weight vectors

pub mod entropy;
pub mod normalization;

pub use entropy::{gini_impurity, shannon_entropy};
pub use normalization::{normalize_log_weights, normalize_weights};
