//! Normalization Utilities
//!
//! Turns unnormalized scores into a probability vector. Both entry points are
//! total: a degenerate input (all zero, all -inf, NaN) produces the uniform
//! distribution instead of an error.
//!
//! Sums run sequentially in index order so that results are bit-identical
//! whether or not the inputs were produced by a parallel loop.

/// Normalize log-weights via max-shifted exponentiation
///
/// Algorithm:
/// 1. m = max finite log-weight (all -inf or NaN ⇒ uniform)
/// 2. w_i = exp(l_i - m), non-finite l_i contributes 0
/// 3. p_i = w_i / Σ w
pub fn normalize_log_weights(log_weights: &[f64]) -> Vec<f64> {
    let n = log_weights.len();
    if n == 0 {
        return Vec::new();
    }

    let max = log_weights
        .iter()
        .copied()
        .filter(|l| l.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    if !max.is_finite() {
        // A +inf entry is a certain winner; otherwise nothing is finite
        let infinite: Vec<bool> = log_weights.iter().map(|l| *l == f64::INFINITY).collect();
        let k = infinite.iter().filter(|b| **b).count();
        if k > 0 {
            return infinite.iter().map(|&b| if b { 1.0 / k as f64 } else { 0.0 }).collect();
        }
        return uniform(n);
    }

    let weights: Vec<f64> = log_weights
        .iter()
        .map(|&l| if l.is_nan() || l == f64::NEG_INFINITY { 0.0 } else { (l.min(max) - max).exp() })
        .collect();
    normalize_weights(&weights)
}

/// Normalize non-negative weights to sum 1 (uniform when the sum is not positive)
pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }

    let mut total = 0.0;
    for &w in weights {
        if w.is_finite() && w > 0.0 {
            total += w;
        }
    }

    if total <= 0.0 || !total.is_finite() {
        return uniform(n);
    }

    weights
        .iter()
        .map(|&w| if w.is_finite() && w > 0.0 { w / total } else { 0.0 })
        .collect()
}

fn uniform(n: usize) -> Vec<f64> {
    vec![1.0 / n as f64; n]
}
