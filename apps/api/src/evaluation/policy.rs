//! Follow-up / completion policy.
//!
//! The model's `is_complete` flag is advisory. The rule that actually decides
//! whether the candidate gets another question is:
//!
//! ```text
//! incomplete = score < 4 AND follow_up_count <  max_follow_ups
//! complete   = score >= 4 OR follow_up_count >= max_follow_ups
//! ```
//!
//! The two are exact complements, so every sanitized result satisfies
//! `is_complete XOR follow_up_question.is_some()`.

use crate::models::conversation::{EvaluationResult, FollowUpPrompt, MAX_SCORE, MIN_SCORE};

/// Scores at or above this need no follow-up.
pub const COMPLETE_SCORE_THRESHOLD: u8 = 4;

/// Used when the answer fell short but the model gave nothing specific to probe.
pub const GENERIC_FOLLOW_UP: &str = "Could you walk me through the specific steps you would take \
     in this situation, and explain why you would take them?";

/// Prefixes the model sometimes prepends to follow-up text. Matched case-insensitively.
const FOLLOW_UP_PREFIXES: &[&str] = &[
    "follow-up question",
    "follow up question",
    "followup question",
    "follow-up",
    "follow up",
    "followup",
    "question",
    "q",
];

/// True when the answer must be followed up.
pub fn should_be_incomplete(score: u8, follow_up_count: u32, max_follow_ups: u32) -> bool {
    score < COMPLETE_SCORE_THRESHOLD && follow_up_count < max_follow_ups
}

/// True when the scenario is finished; always `!should_be_incomplete(..)`.
pub fn should_be_complete(score: u8, follow_up_count: u32, max_follow_ups: u32) -> bool {
    score >= COMPLETE_SCORE_THRESHOLD || follow_up_count >= max_follow_ups
}

/// Sanitizes a raw evaluation against the follow-up budget.
///
/// `follow_up_count` is the number of follow-ups already asked for this scenario
/// (0 while evaluating the answer to the base question). Fallback results pass
/// through untouched; they are already complete.
pub fn apply_follow_up_policy(
    raw: EvaluationResult,
    follow_up_count: u32,
    max_follow_ups: u32,
) -> EvaluationResult {
    if raw.is_fallback() {
        return raw;
    }

    let score = raw.score.clamp(MIN_SCORE, MAX_SCORE);
    let missing_aspects: Vec<String> = raw
        .missing_aspects
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();

    if should_be_incomplete(score, follow_up_count, max_follow_ups) {
        let follow_up_question = raw
            .follow_up_question
            .as_deref()
            .map(clean_follow_up_text)
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| synthesize_follow_up(&missing_aspects));

        return EvaluationResult {
            score,
            is_complete: false,
            missing_aspects,
            follow_up_question: Some(follow_up_question),
            ..raw
        };
    }

    debug_assert!(should_be_complete(score, follow_up_count, max_follow_ups));
    EvaluationResult {
        score,
        is_complete: true,
        missing_aspects,
        follow_up_question: None,
        ..raw
    }
}

/// Builds the candidate-facing follow-up for position `sequence` (1-based).
pub fn label_follow_up(text: &str, sequence: u32, max_follow_ups: u32) -> FollowUpPrompt {
    FollowUpPrompt {
        question: clean_follow_up_text(text),
        sequence,
        label: format!("Follow-up {sequence} of {}", max_follow_ups.max(sequence)),
    }
}

/// Strips labels such as "Follow-up 2:" or "Q:" and surrounding quotes.
pub fn clean_follow_up_text(text: &str) -> String {
    let mut current = text.trim();

    loop {
        let stripped = strip_label(current);
        if stripped.len() == current.len() {
            break;
        }
        current = stripped;
    }

    current
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim()
        .to_string()
}

fn strip_label(text: &str) -> &str {
    for prefix in FOLLOW_UP_PREFIXES {
        let Some(head) = text.get(..prefix.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(prefix) {
            continue;
        }
        let rest = &text[prefix.len()..];
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit() || c == '#' || c == ' ');
        if let Some(after) = rest.strip_prefix(':').or_else(|| rest.strip_prefix('.')) {
            return after.trim_start();
        }
    }
    text
}

fn synthesize_follow_up(missing_aspects: &[String]) -> String {
    if missing_aspects.is_empty() {
        return GENERIC_FOLLOW_UP.to_string();
    }
    let aspects = missing_aspects
        .iter()
        .take(3)
        .map(|a| a.trim_end_matches('.'))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Could you elaborate on how you would address: {aspects}?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::conversation::EvaluationSource;

    fn raw(score: u8, is_complete: bool, follow_up: Option<&str>) -> EvaluationResult {
        EvaluationResult {
            score,
            is_complete,
            missing_aspects: vec!["stakeholder communication".to_string()],
            follow_up_question: follow_up.map(str::to_string),
            rationale: "test".to_string(),
            strengths: vec![],
            source: EvaluationSource::Llm,
        }
    }

    #[test]
    fn test_rules_are_mutually_exclusive() {
        for score in 1..=5u8 {
            for count in 0..4u32 {
                for max in 0..4u32 {
                    assert_ne!(
                        should_be_incomplete(score, count, max),
                        should_be_complete(score, count, max),
                        "score={score} count={count} max={max}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_policy_follows_up_exactly_when_rule_says_incomplete() {
        for (score, count, max) in [(3, 0, 2), (3, 2, 2), (4, 0, 2), (1, 1, 3), (5, 3, 3)] {
            let result = apply_follow_up_policy(raw(score, true, None), count, max);
            assert_eq!(
                result.follow_up_question.is_some(),
                should_be_incomplete(score, count, max),
                "score={score} count={count} max={max}"
            );
            assert_eq!(result.is_complete, result.follow_up_question.is_none());
        }
    }

    #[test]
    fn test_high_score_overrides_llm_incomplete_flag() {
        let result = apply_follow_up_policy(raw(4, false, Some("Why?")), 0, 2);
        assert!(result.is_complete);
        assert!(result.follow_up_question.is_none());
    }

    #[test]
    fn test_low_score_forces_follow_up_even_if_llm_says_complete() {
        let result = apply_follow_up_policy(raw(2, true, Some("What would you say first?")), 0, 2);
        assert!(!result.is_complete);
        assert_eq!(
            result.follow_up_question.as_deref(),
            Some("What would you say first?")
        );
    }

    #[test]
    fn test_exhausted_budget_completes_low_score() {
        let result = apply_follow_up_policy(raw(2, false, Some("Anything else?")), 2, 2);
        assert!(result.is_complete);
        assert!(result.follow_up_question.is_none());
        assert_eq!(result.score, 2);
    }

    #[test]
    fn test_zero_budget_never_follows_up() {
        let result = apply_follow_up_policy(raw(1, false, Some("More?")), 0, 0);
        assert!(result.is_complete);
    }

    #[test]
    fn test_missing_follow_up_is_synthesized_from_aspects() {
        let result = apply_follow_up_policy(raw(3, false, None), 1, 2);
        let question = result.follow_up_question.unwrap();
        assert!(question.contains("stakeholder communication"), "{question}");
    }

    #[test]
    fn test_blank_follow_up_without_aspects_uses_generic() {
        let mut input = raw(3, false, Some("   "));
        input.missing_aspects.clear();
        let result = apply_follow_up_policy(input, 0, 1);
        assert_eq!(result.follow_up_question.as_deref(), Some(GENERIC_FOLLOW_UP));
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        assert_eq!(apply_follow_up_policy(raw(9, true, None), 0, 2).score, 5);
        let zero = apply_follow_up_policy(raw(0, true, None), 0, 2);
        assert_eq!(zero.score, 1);
        assert!(!zero.is_complete);
    }

    #[test]
    fn test_fallback_passes_through() {
        let mut input = raw(3, true, None);
        input.source = EvaluationSource::Fallback;
        let result = apply_follow_up_policy(input.clone(), 0, 2);
        assert_eq!(result, input);
    }

    #[test]
    fn test_clean_follow_up_strips_labels_and_quotes() {
        assert_eq!(
            clean_follow_up_text("Follow-up 2: How would you escalate?"),
            "How would you escalate?"
        );
        assert_eq!(
            clean_follow_up_text("Follow-up question: \"Who would you tell?\""),
            "Who would you tell?"
        );
        assert_eq!(clean_follow_up_text("Q: Why?"), "Why?");
        assert_eq!(
            clean_follow_up_text("Question 1. Follow up: What next?"),
            "What next?"
        );
    }

    #[test]
    fn test_clean_follow_up_keeps_ordinary_questions() {
        assert_eq!(
            clean_follow_up_text("Quickly, what is your first step?"),
            "Quickly, what is your first step?"
        );
        assert_eq!(
            clean_follow_up_text("Follow up with whom, and why?"),
            "Follow up with whom, and why?"
        );
    }

    #[test]
    fn test_label_follow_up_sequences() {
        let prompt = label_follow_up("Follow-up: Why that order?", 2, 3);
        assert_eq!(prompt.question, "Why that order?");
        assert_eq!(prompt.sequence, 2);
        assert_eq!(prompt.label, "Follow-up 2 of 3");
    }
}
