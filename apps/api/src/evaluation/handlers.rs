//! Axum route handlers for live answer evaluation.

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::attempts::lifecycle::{attempt_metadata, snapshot_scenarios};
use crate::attempts::store::get_attempt;
use crate::errors::AppError;
use crate::evaluation::analysis::{evaluate_sjt_turn, SjtTurn, SjtTurnInput};
use crate::evaluation::evaluator::{evaluate_jdt_with_fallback, Exchange, JdtEvaluationRequest};
use crate::models::configuration::TestType;
use crate::models::conversation::EvaluationResult;
use crate::models::records::STATUS_IN_PROGRESS;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SjtEvaluationBody {
    pub attempt_id: Uuid,
    pub scenario_id: String,
    pub answer: String,
    /// Follow-ups already asked on this scenario; 0 for the base question.
    #[serde(default)]
    pub follow_up_count: u32,
    /// The follow-up being answered. Required when `follow_up_count > 0`.
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub previous_exchanges: Vec<Exchange>,
}

#[derive(Debug, Deserialize)]
pub struct JdtEvaluationBody {
    #[serde(default)]
    pub attempt_id: Option<Uuid>,
    pub question: String,
    #[serde(default)]
    pub preferred_answer: Option<String>,
    #[serde(default)]
    pub competency: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    pub answer: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/evaluations/sjt
///
/// Scores one SJT answer against the scenario frozen into the attempt and
/// decides whether a follow-up is asked. LLM failures yield the fallback
/// evaluation, never an error.
pub async fn handle_evaluate_sjt(
    State(state): State<AppState>,
    Json(body): Json<SjtEvaluationBody>,
) -> Result<Json<SjtTurn>, AppError> {
    let attempt = get_attempt(&state.db, body.attempt_id).await?;
    if TestType::parse(&attempt.test_type) != Some(TestType::Sjt) {
        return Err(AppError::Validation(format!(
            "Attempt {} is not an SJT attempt",
            attempt.id
        )));
    }
    if attempt.status != STATUS_IN_PROGRESS {
        return Err(AppError::Validation(format!(
            "Attempt {} is not in progress",
            attempt.id
        )));
    }

    let rules = attempt_metadata(&attempt)?.scoring;
    if body.follow_up_count > rules.max_follow_ups {
        return Err(AppError::Validation(format!(
            "follow_up_count {} exceeds the configured maximum of {}",
            body.follow_up_count, rules.max_follow_ups
        )));
    }

    let scenarios = snapshot_scenarios(&attempt)?;
    let scenario = scenarios
        .iter()
        .find(|s| s.id == body.scenario_id)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Scenario '{}' is not part of attempt {}",
                body.scenario_id, attempt.id
            ))
        })?;

    let question = match (body.follow_up_count, body.question.as_deref()) {
        (_, Some(q)) if !q.trim().is_empty() => q,
        (0, _) => scenario.question.as_str(),
        _ => {
            return Err(AppError::Validation(
                "question is required when answering a follow-up".to_string(),
            ))
        }
    };

    let turn = evaluate_sjt_turn(
        state.evaluator.as_ref(),
        SjtTurnInput {
            scenario,
            question,
            answer: &body.answer,
            previous_exchanges: &body.previous_exchanges,
            follow_up_count: body.follow_up_count,
            rules,
        },
    )
    .await;

    Ok(Json(turn))
}

/// POST /api/v1/evaluations/jdt
pub async fn handle_evaluate_jdt(
    State(state): State<AppState>,
    Json(body): Json<JdtEvaluationBody>,
) -> Result<Json<EvaluationResult>, AppError> {
    if body.question.trim().is_empty() {
        return Err(AppError::Validation("question cannot be empty".to_string()));
    }

    let job_description = match (&body.job_description, body.attempt_id) {
        (Some(jd), _) => Some(jd.clone()),
        (None, Some(attempt_id)) => {
            let attempt = get_attempt(&state.db, attempt_id).await?;
            attempt_metadata(&attempt)?.job_description
        }
        (None, None) => None,
    };

    let request = JdtEvaluationRequest {
        question: &body.question,
        preferred_answer: body.preferred_answer.as_deref(),
        competency: body.competency.as_deref(),
        job_description: job_description.as_deref(),
        answer: &body.answer,
    };
    let evaluation = evaluate_jdt_with_fallback(state.evaluator.as_ref(), &request).await;

    Ok(Json(evaluation))
}
