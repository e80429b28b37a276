//! Continuous matching with tolerance
//!
//! The recorded range [lo, hi] is widened by `toleranceFactor × span` on both
//! sides. Span is the taxon's own range width, falling back to the trait's
//! declared range when the taxon records a single point. Bounds are inclusive.

use super::MatchResult;
use crate::matrix::NumericRange;

/// Slack for inclusive bound comparisons
const EPS: f64 = 1e-9;

/// Width used to scale the tolerance and the conflict strength
fn effective_span(recorded: NumericRange, declared: Option<NumericRange>) -> f64 {
    let own = recorded.span();
    if own > 0.0 {
        return own;
    }
    declared.map(|r| r.span()).filter(|s| *s > 0.0).unwrap_or(0.0)
}

/// Match a measured value against a recorded range
///
/// # Arguments
/// * `value` - Measured value
/// * `recorded` - Taxon's recorded range
/// * `declared` - Trait's declared [minValue, maxValue], if any
/// * `tolerance_factor` - Fraction of the span added to both sides
pub fn match_continuous(
    value: f64,
    recorded: NumericRange,
    declared: Option<NumericRange>,
    tolerance_factor: f64,
) -> MatchResult {
    if !value.is_finite() || !recorded.min.is_finite() || !recorded.max.is_finite() {
        return MatchResult::unknown();
    }

    let span = effective_span(recorded, declared);
    let tolerance = tolerance_factor.max(0.0) * span;
    let lo = recorded.min - tolerance;
    let hi = recorded.max + tolerance;

    if value >= lo - EPS && value <= hi + EPS {
        return MatchResult::agree(1.0);
    }

    let overshoot = if value < lo { lo - value } else { value - hi };
    let strength = if span > 0.0 {
        (1.0 - overshoot / span).max(0.0)
    } else {
        0.0
    };
    MatchResult::conflict(strength)
}
