//! Entropy and impurity over (possibly unnormalized) weight vectors

/// Shannon entropy in bits; weights are normalized first, zeros contribute nothing
pub fn shannon_entropy(weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 || total.is_nan() {
        return 0.0;
    }
    let mut h = 0.0;
    for &w in weights {
        if w > 0.0 {
            let p = w / total;
            h -= p * p.log2();
        }
    }
    h.max(0.0)
}

/// Gini impurity 1 - Σp²
pub fn gini_impurity(weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 || total.is_nan() {
        return 0.0;
    }
    let mut sq = 0.0;
    for &w in weights {
        if w > 0.0 {
            let p = w / total;
            sq += p * p;
        }
    }
    (1.0 - sq).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_entropy_of_fair_coin() {
        assert_relative_eq!(shannon_entropy(&[0.5, 0.5]), 1.0);
        assert_relative_eq!(shannon_entropy(&[3.0, 3.0, 3.0, 3.0]), 2.0);
        assert_eq!(shannon_entropy(&[1.0, 0.0]), 0.0);
        assert_eq!(shannon_entropy(&[]), 0.0);
    }

    #[test]
    fn test_gini() {
        assert_relative_eq!(gini_impurity(&[0.5, 0.5]), 0.5);
        assert_relative_eq!(gini_impurity(&[1.0]), 0.0);
    }
}
