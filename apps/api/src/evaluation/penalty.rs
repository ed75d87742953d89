//! Follow-up penalty arithmetic.
//!
//! Each follow-up a scenario needed takes `penalty_percent` off the score:
//! `post = pre * (1 - penalty_percent / 100 * follow_ups)`, never below the
//! scale minimum, rounded to two decimals.

use serde::{Deserialize, Serialize};

use crate::models::configuration::ScoringRules;
use crate::models::conversation::MIN_SCORE;

/// Pre/post penalty outcome for one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyOutcome {
    pub pre_penalty_score: f64,
    pub post_penalty_score: f64,
    pub penalty_applied: f64,
}

pub fn apply_penalty(
    pre_penalty_score: f64,
    follow_up_count: u32,
    rules: &ScoringRules,
) -> PenaltyOutcome {
    let percent = rules.follow_up_penalty_percent.clamp(0.0, 100.0);
    let reduction = (percent / 100.0 * follow_up_count as f64).min(1.0);

    let pre = round2(pre_penalty_score);
    let post = if follow_up_count == 0 || percent == 0.0 {
        pre
    } else {
        round2((pre * (1.0 - reduction)).max(MIN_SCORE as f64))
    };

    PenaltyOutcome {
        pre_penalty_score: pre,
        post_penalty_score: post,
        penalty_applied: round2(pre - post),
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
