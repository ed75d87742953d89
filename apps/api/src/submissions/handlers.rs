use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::attempts::store::get_attempt;
use crate::errors::AppError;
use crate::models::configuration::TestType;
use crate::models::conversation::ConversationEntry;
use crate::models::records::SubmissionRow;
use crate::state::AppState;
use crate::submissions::pipeline::{
    analyze_submission, check_scores, count_questions, ReportSummary,
};
use crate::submissions::store::{
    count_submissions, get_submission, insert_submission, latest_submission, list_analyzed,
    list_submissions, NewSubmission, SubmissionFilter,
};

#[derive(Debug, Deserialize)]
pub struct CreateSubmissionRequest {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    #[serde(default)]
    pub attempt_id: Option<Uuid>,
    pub test_type: TestType,
    pub candidate_name: String,
    pub conversation_history: Vec<ConversationEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionListQuery {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub test_type: Option<TestType>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub test_type: Option<TestType>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionCount {
    pub user_id: Uuid,
    pub test_type: TestType,
    pub submission_count: i64,
}

/// POST /api/v1/submissions
pub async fn handle_create_submission(
    State(state): State<AppState>,
    Json(req): Json<CreateSubmissionRequest>,
) -> Result<(StatusCode, Json<SubmissionRow>), AppError> {
    if req.candidate_name.trim().is_empty() {
        return Err(AppError::Validation(
            "candidate_name cannot be empty".to_string(),
        ));
    }
    if req.conversation_history.is_empty() {
        return Err(AppError::Validation(
            "conversation_history must contain at least one answer".to_string(),
        ));
    }
    check_scores(&req.conversation_history)?;

    if let Some(attempt_id) = req.attempt_id {
        let attempt = get_attempt(&state.db, attempt_id).await?;
        if attempt.user_id != req.user_id || TestType::parse(&attempt.test_type) != Some(req.test_type)
        {
            return Err(AppError::Validation(format!(
                "Attempt {attempt_id} does not belong to this user and test type"
            )));
        }
    }

    let conversation = serde_json::to_value(&req.conversation_history)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize conversation: {e}")))?;

    let row = insert_submission(
        &state.db,
        NewSubmission {
            user_id: req.user_id,
            tenant_id: req.tenant_id,
            attempt_id: req.attempt_id,
            test_type: req.test_type,
            candidate_name: req.candidate_name.trim(),
            conversation_history: &conversation,
            counts: count_questions(&req.conversation_history),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/submissions
pub async fn handle_list_submissions(
    State(state): State<AppState>,
    Query(params): Query<SubmissionListQuery>,
) -> Result<Json<Vec<SubmissionRow>>, AppError> {
    let filter = SubmissionFilter {
        tenant_id: params.tenant_id,
        user_id: params.user_id,
        test_type: params.test_type,
        status: params.status,
    };
    Ok(Json(list_submissions(&state.db, &filter).await?))
}

/// GET /api/v1/submissions/:id
pub async fn handle_get_submission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionRow>, AppError> {
    Ok(Json(get_submission(&state.db, id).await?))
}

/// GET /api/v1/submissions/users/:user_id/:test_type/latest
///
/// `null` when the user has no submission of that type.
pub async fn handle_latest_submission(
    State(state): State<AppState>,
    Path((user_id, test_type)): Path<(Uuid, TestType)>,
) -> Result<Json<Option<SubmissionRow>>, AppError> {
    Ok(Json(latest_submission(&state.db, user_id, test_type).await?))
}

/// GET /api/v1/submissions/users/:user_id/:test_type/count
pub async fn handle_count_submissions(
    State(state): State<AppState>,
    Path((user_id, test_type)): Path<(Uuid, TestType)>,
) -> Result<Json<SubmissionCount>, AppError> {
    let submission_count = count_submissions(&state.db, user_id, test_type).await?;
    Ok(Json(SubmissionCount {
        user_id,
        test_type,
        submission_count,
    }))
}

/// POST /api/v1/submissions/:id/analyze
pub async fn handle_analyze_submission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionRow>, AppError> {
    Ok(Json(analyze_submission(&state, id).await?))
}

/// GET /api/v1/reports
pub async fn handle_list_reports(
    State(state): State<AppState>,
    Query(params): Query<ReportListQuery>,
) -> Result<Json<Vec<ReportSummary>>, AppError> {
    let filter = SubmissionFilter {
        tenant_id: params.tenant_id,
        user_id: params.user_id,
        test_type: params.test_type,
        status: None,
    };
    let rows = list_analyzed(&state.db, &filter).await?;

    let reports = rows
        .iter()
        .filter_map(|row| {
            let summary = ReportSummary::from_row(row);
            if summary.is_none() {
                warn!("Skipping submission {} with unreadable analysis", row.id);
            }
            summary
        })
        .collect();
    Ok(Json(reports))
}
