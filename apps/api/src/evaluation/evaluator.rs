//! Pluggable, trait-based scorer for SJT and JDT answers.
//!
//! Default: `LlmAssessmentEvaluator` (Claude via `LlmClient`).
//! `AppState` holds an `Arc<dyn AssessmentEvaluator>`; tests swap in a stub.
//!
//! The trait reports errors honestly. The `*_with_fallback` helpers are what
//! the interview flow calls: they never fail, substituting a fixed placeholder
//! so a candidate is never stuck on a question because the model is down.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AppError;
use crate::evaluation::aggregation::{CompetencySummary, ScenarioResult};
use crate::evaluation::prompts::{
    COMPETENCY_SUMMARY_PROMPT_TEMPLATE, COMPETENCY_SUMMARY_SYSTEM, JDT_EVALUATION_PROMPT_TEMPLATE,
    JDT_EVALUATION_SYSTEM, SJT_EVALUATION_PROMPT_TEMPLATE, SJT_EVALUATION_SYSTEM,
};
use crate::llm_client::prompts::{
    fill_template, FAIRNESS_INSTRUCTION, JSON_ONLY_SYSTEM, SCORE_SCALE_INSTRUCTION,
};
use crate::llm_client::LlmClient;
use crate::models::configuration::Scenario;
use crate::models::conversation::{EvaluationResult, EvaluationSource, MAX_SCORE, MIN_SCORE};

/// Score assigned when the model cannot be used.
pub const FALLBACK_SCORE: u8 = 3;

const FALLBACK_RATIONALE: &str =
    "Automatic evaluation was unavailable for this answer; a neutral default score was recorded.";

const EMPTY_ANSWER_RATIONALE: &str = "No answer was given.";

// ────────────────────────────────────────────────────────────────────────────
// Request models
// ────────────────────────────────────────────────────────────────────────────

/// An earlier question/answer pair on the same scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone)]
pub struct SjtEvaluationRequest<'a> {
    pub scenario: &'a Scenario,
    /// The question the candidate just answered (base question or follow-up).
    pub question: &'a str,
    pub answer: &'a str,
    pub previous_exchanges: &'a [Exchange],
    pub follow_up_count: u32,
    pub max_follow_ups: u32,
}

#[derive(Debug, Clone)]
pub struct JdtEvaluationRequest<'a> {
    pub question: &'a str,
    pub preferred_answer: Option<&'a str>,
    pub competency: Option<&'a str>,
    pub job_description: Option<&'a str>,
    pub answer: &'a str,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// The evaluator trait. Implement this to swap scoring backends without
/// touching handlers or the analysis pipeline.
#[async_trait]
pub trait AssessmentEvaluator: Send + Sync {
    /// Raw verdict on an SJT answer. Not yet sanitized by the follow-up policy.
    async fn evaluate_sjt(
        &self,
        request: &SjtEvaluationRequest<'_>,
    ) -> Result<EvaluationResult, AppError>;

    async fn evaluate_jdt(
        &self,
        request: &JdtEvaluationRequest<'_>,
    ) -> Result<EvaluationResult, AppError>;

    async fn summarize_competency(
        &self,
        summary: &CompetencySummary,
        scenarios: &[&ScenarioResult],
    ) -> Result<String, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmAssessmentEvaluator
// ────────────────────────────────────────────────────────────────────────────

/// Model output for SJT answers. Scores are read as floats because the model
/// occasionally answers "3.5".
#[derive(Debug, Deserialize)]
struct RawSjtEvaluation {
    score: f64,
    #[serde(default)]
    is_complete: bool,
    #[serde(default)]
    missing_aspects: Vec<String>,
    #[serde(default)]
    follow_up_question: Option<String>,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize)]
struct RawJdtEvaluation {
    score: f64,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    missing_aspects: Vec<String>,
    #[serde(default)]
    rationale: String,
}

pub struct LlmAssessmentEvaluator(pub LlmClient);

#[async_trait]
impl AssessmentEvaluator for LlmAssessmentEvaluator {
    async fn evaluate_sjt(
        &self,
        request: &SjtEvaluationRequest<'_>,
    ) -> Result<EvaluationResult, AppError> {
        let prompt = build_sjt_prompt(request);
        let raw: RawSjtEvaluation = self
            .0
            .call_json(&prompt, SJT_EVALUATION_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(format!("SJT evaluation failed: {e}")))?;

        Ok(EvaluationResult {
            score: normalize_score(raw.score),
            is_complete: raw.is_complete,
            missing_aspects: raw.missing_aspects,
            follow_up_question: raw.follow_up_question,
            rationale: raw.rationale,
            strengths: vec![],
            source: EvaluationSource::Llm,
        })
    }

    async fn evaluate_jdt(
        &self,
        request: &JdtEvaluationRequest<'_>,
    ) -> Result<EvaluationResult, AppError> {
        let prompt = build_jdt_prompt(request);
        let raw: RawJdtEvaluation = self
            .0
            .call_json(&prompt, JDT_EVALUATION_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(format!("JDT evaluation failed: {e}")))?;

        Ok(EvaluationResult {
            score: normalize_score(raw.score),
            is_complete: true,
            missing_aspects: raw.missing_aspects,
            follow_up_question: None,
            rationale: raw.rationale,
            strengths: raw.strengths,
            source: EvaluationSource::Llm,
        })
    }

    async fn summarize_competency(
        &self,
        summary: &CompetencySummary,
        scenarios: &[&ScenarioResult],
    ) -> Result<String, AppError> {
        let prompt = build_summary_prompt(summary, scenarios);
        self.0
            .call_text(&prompt, COMPETENCY_SUMMARY_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(format!("Competency summary failed: {e}")))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Never-failing entry points
// ────────────────────────────────────────────────────────────────────────────

pub async fn evaluate_sjt_with_fallback(
    evaluator: &dyn AssessmentEvaluator,
    request: &SjtEvaluationRequest<'_>,
) -> EvaluationResult {
    if request.answer.trim().is_empty() {
        return empty_answer_evaluation();
    }

    match evaluator.evaluate_sjt(request).await {
        Ok(result) => result,
        Err(e) => {
            warn!(
                "SJT evaluation for scenario {} fell back to default score: {e}",
                request.scenario.id
            );
            fallback_evaluation()
        }
    }
}

pub async fn evaluate_jdt_with_fallback(
    evaluator: &dyn AssessmentEvaluator,
    request: &JdtEvaluationRequest<'_>,
) -> EvaluationResult {
    if request.answer.trim().is_empty() {
        return EvaluationResult {
            is_complete: true,
            ..empty_answer_evaluation()
        };
    }

    match evaluator.evaluate_jdt(request).await {
        Ok(result) => result,
        Err(e) => {
            warn!("JDT evaluation fell back to default score: {e}");
            fallback_evaluation()
        }
    }
}

pub async fn summarize_with_fallback(
    evaluator: &dyn AssessmentEvaluator,
    summary: &CompetencySummary,
    scenarios: &[&ScenarioResult],
) -> String {
    match evaluator.summarize_competency(summary, scenarios).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => fallback_summary(summary),
        Err(e) => {
            warn!(
                "Summary for competency {} fell back to template: {e}",
                summary.competency
            );
            fallback_summary(summary)
        }
    }
}

/// Fixed placeholder written when the model fails: neutral score, complete,
/// nothing missing, no follow-up.
pub fn fallback_evaluation() -> EvaluationResult {
    EvaluationResult {
        score: FALLBACK_SCORE,
        is_complete: true,
        missing_aspects: vec![],
        follow_up_question: None,
        rationale: FALLBACK_RATIONALE.to_string(),
        strengths: vec![],
        source: EvaluationSource::Fallback,
    }
}

/// Blank answers score the minimum without a model call. Missing aspects stay
/// empty so the follow-up is the generic one and never quotes the rubric.
fn empty_answer_evaluation() -> EvaluationResult {
    EvaluationResult {
        score: MIN_SCORE,
        is_complete: false,
        missing_aspects: vec![],
        follow_up_question: None,
        rationale: EMPTY_ANSWER_RATIONALE.to_string(),
        strengths: vec![],
        source: EvaluationSource::Rule,
    }
}

/// Deterministic summary sentence used when the model is unavailable.
pub fn fallback_summary(summary: &CompetencySummary) -> String {
    match (summary.average_post_penalty_score, summary.rating) {
        (Some(score), Some(rating)) => {
            let follow_ups = match summary.total_follow_ups {
                0 => "without needing follow-up questions".to_string(),
                1 => "after 1 follow-up question".to_string(),
                n => format!("after {n} follow-up questions"),
            };
            format!(
                "{}: {} ({score:.2}/5 across {} scenario(s), {follow_ups}).",
                summary.display_name(),
                rating.label(),
                summary.scored_scenario_count,
            )
        }
        _ => format!(
            "{}: not enough scored answers to assess this competency.",
            summary.display_name()
        ),
    }
}

fn normalize_score(raw: f64) -> u8 {
    if !raw.is_finite() {
        return FALLBACK_SCORE;
    }
    raw.round().clamp(MIN_SCORE as f64, MAX_SCORE as f64) as u8
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt builders
// ────────────────────────────────────────────────────────────────────────────

fn or_placeholder(text: &str) -> &str {
    if text.trim().is_empty() {
        "(not provided)"
    } else {
        text.trim()
    }
}

pub fn build_sjt_prompt(request: &SjtEvaluationRequest<'_>) -> String {
    let scenario = request.scenario;

    let history = if request.previous_exchanges.is_empty() {
        "(none; this is the first answer)".to_string()
    } else {
        request
            .previous_exchanges
            .iter()
            .enumerate()
            .map(|(i, ex)| format!("{}. Q: {}\n   A: {}", i + 1, ex.question.trim(), ex.answer.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let remaining = request.max_follow_ups.saturating_sub(request.follow_up_count).to_string();

    fill_template(
        SJT_EVALUATION_PROMPT_TEMPLATE,
        &[
            ("fairness", FAIRNESS_INSTRUCTION),
            ("score_scale", SCORE_SCALE_INSTRUCTION),
            ("json_only", JSON_ONLY_SYSTEM),
            (
                "competency",
                or_placeholder(scenario.competency.as_deref().unwrap_or_default()),
            ),
            ("situation", or_placeholder(&scenario.situation)),
            ("best_rationale", or_placeholder(&scenario.best_response_rationale)),
            ("worst_rationale", or_placeholder(&scenario.worst_response_rationale)),
            ("follow_ups_remaining", remaining.as_str()),
            ("history", history.as_str()),
            ("question", or_placeholder(request.question)),
            ("answer", request.answer.trim()),
        ],
    )
}

pub fn build_jdt_prompt(request: &JdtEvaluationRequest<'_>) -> String {
    fill_template(
        JDT_EVALUATION_PROMPT_TEMPLATE,
        &[
            ("fairness", FAIRNESS_INSTRUCTION),
            ("score_scale", SCORE_SCALE_INSTRUCTION),
            ("json_only", JSON_ONLY_SYSTEM),
            (
                "job_description",
                or_placeholder(request.job_description.unwrap_or_default()),
            ),
            ("competency", or_placeholder(request.competency.unwrap_or_default())),
            (
                "preferred_answer",
                or_placeholder(request.preferred_answer.unwrap_or_default()),
            ),
            ("question", or_placeholder(request.question)),
            ("answer", request.answer.trim()),
        ],
    )
}

pub fn build_summary_prompt(summary: &CompetencySummary, scenarios: &[&ScenarioResult]) -> String {
    let evidence = scenarios
        .iter()
        .filter(|s| s.scored)
        .map(|s| {
            let rationale = s.rationale.as_deref().unwrap_or("no rationale recorded");
            let missing = if s.missing_aspects.is_empty() {
                String::new()
            } else {
                format!(" Missing: {}.", s.missing_aspects.join("; "))
            };
            format!(
                "- {} (score {:.2}, {} follow-up(s)): {rationale}{missing}",
                s.question,
                s.post_penalty_score.unwrap_or_default(),
                s.follow_up_count
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let average = summary
        .average_post_penalty_score
        .map(|s| format!("{s:.2}"))
        .unwrap_or_else(|| "n/a".to_string());
    let follow_ups = summary.total_follow_ups.to_string();

    fill_template(
        COMPETENCY_SUMMARY_PROMPT_TEMPLATE,
        &[
            ("competency", summary.display_name()),
            (
                "definition",
                or_placeholder(summary.description.as_deref().unwrap_or_default()),
            ),
            ("average_score", average.as_str()),
            ("rating", summary.rating.map(|r| r.label()).unwrap_or("unrated")),
            ("follow_ups", follow_ups.as_str()),
            ("evidence", evidence.as_str()),
        ],
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
