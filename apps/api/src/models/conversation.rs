use serde::{Deserialize, Serialize};

/// Lowest and highest score on the evaluation scale.
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// Where an evaluation came from. Fallback results are placeholders written
/// when the model could not be reached or returned unusable output; rule
/// results are decided without a model call (e.g. an empty answer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationSource {
    #[default]
    Llm,
    Rule,
    Fallback,
}

/// Structured verdict on a single candidate answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// 1–5.
    pub score: u8,
    pub is_complete: bool,
    #[serde(default)]
    pub missing_aspects: Vec<String>,
    #[serde(default)]
    pub follow_up_question: Option<String>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub source: EvaluationSource,
}

impl EvaluationResult {
    pub fn is_fallback(&self) -> bool {
        self.source == EvaluationSource::Fallback
    }
}

/// A follow-up question ready to show the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpPrompt {
    pub question: String,
    /// 1-based position among this scenario's follow-ups.
    pub sequence: u32,
    pub label: String,
}

/// One question/answer turn of an interview.
///
/// Follow-up question/answer pairs are the entries of the same scenario with
/// `is_follow_up = true`, numbered by `follow_up_sequence`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    #[serde(default)]
    pub scenario_id: Option<String>,
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub competency: Option<String>,
    /// JDT rubric text, carried so post-hoc analysis needs no config lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_answer: Option<String>,
    #[serde(default)]
    pub is_follow_up: bool,
    /// 0 for the base question, 1.. for follow-ups.
    #[serde(default)]
    pub follow_up_sequence: u32,
    /// The follow-up that was asked after this answer, if any.
    #[serde(default)]
    pub follow_up_question: Option<String>,
    #[serde(default)]
    pub evaluation: Option<EvaluationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_penalty_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_penalty_score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_evaluation_source_defaults_to_llm() {
        let result: EvaluationResult = serde_json::from_value(json!({
            "score": 4,
            "is_complete": true,
            "rationale": "Clear plan"
        }))
        .unwrap();
        assert_eq!(result.source, EvaluationSource::Llm);
        assert!(result.missing_aspects.is_empty());
        assert!(result.follow_up_question.is_none());
        assert!(!result.is_fallback());
    }

    #[test]
    fn test_entry_from_minimal_client_payload() {
        let entry: ConversationEntry = serde_json::from_value(json!({
            "scenario_id": "s1",
            "question": "What would you do?",
            "answer": "Talk to them first."
        }))
        .unwrap();
        assert_eq!(entry.follow_up_sequence, 0);
        assert!(!entry.is_follow_up);
        assert!(entry.evaluation.is_none());
    }

    #[test]
    fn test_penalty_scores_omitted_until_set() {
        let entry = ConversationEntry {
            question: "q".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("pre_penalty_score").is_none());
        assert!(value.get("post_penalty_score").is_none());
    }
}
