//! Binary (and derived-child) matching

use super::MatchResult;
use crate::matrix::Ternary;

/// Equal states agree, opposite states conflict, anything unknown is unknown
pub fn match_binary(observed: Ternary, recorded: Ternary) -> MatchResult {
    if !observed.is_known() || !recorded.is_known() {
        return MatchResult::unknown();
    }
    if observed == recorded {
        MatchResult::agree(1.0)
    } else {
        MatchResult::conflict(0.0)
    }
}
