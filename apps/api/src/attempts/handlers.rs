use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::assignments::store::record_progress;
use crate::attempts::lifecycle::{
    attempt_metadata, check_availability, start_attempt, Availability, StartAttempt,
    StartedAttempt,
};
use crate::attempts::store::{complete_attempt, get_attempt, list_attempts};
use crate::errors::AppError;
use crate::models::assignment::ASSIGNMENT_COMPLETED;
use crate::models::configuration::TestType;
use crate::models::records::TestAttemptRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub test_type: TestType,
}

#[derive(Debug, Deserialize)]
pub struct AttemptListQuery {
    pub user_id: Uuid,
    pub test_type: Option<TestType>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteAttemptRequest {
    #[serde(default)]
    pub answers_count: Option<u32>,
}

/// GET /api/v1/attempts/availability
pub async fn handle_availability(
    State(state): State<AppState>,
    Query(params): Query<AvailabilityQuery>,
) -> Result<Json<Availability>, AppError> {
    let (availability, _) =
        check_availability(&state, params.user_id, params.tenant_id, params.test_type).await?;
    Ok(Json(availability))
}

/// POST /api/v1/attempts/start
pub async fn handle_start_attempt(
    State(state): State<AppState>,
    Json(req): Json<StartAttempt>,
) -> Result<(StatusCode, Json<StartedAttempt>), AppError> {
    let started = start_attempt(&state, &req).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// GET /api/v1/attempts
pub async fn handle_list_attempts(
    State(state): State<AppState>,
    Query(params): Query<AttemptListQuery>,
) -> Result<Json<Vec<TestAttemptRow>>, AppError> {
    let attempts = list_attempts(
        &state.db,
        params.user_id,
        params.test_type,
        params.status.as_deref(),
    )
    .await?;
    Ok(Json(attempts))
}

/// GET /api/v1/attempts/:id
pub async fn handle_get_attempt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TestAttemptRow>, AppError> {
    Ok(Json(get_attempt(&state.db, id).await?))
}

/// POST /api/v1/attempts/:id/complete
pub async fn handle_complete_attempt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<CompleteAttemptRequest>>,
) -> Result<Json<TestAttemptRow>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let attempt = get_attempt(&state.db, id).await?;
    let mut metadata = attempt_metadata(&attempt)?;
    if req.answers_count.is_some() {
        metadata.answers_count = req.answers_count;
    }
    let metadata = serde_json::to_value(&metadata)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize attempt metadata: {e}")))?;

    let completed = complete_attempt(&state.db, id, &metadata).await?;
    if let Some(test_type) = TestType::parse(&completed.test_type) {
        record_progress(&state.db, completed.user_id, test_type, ASSIGNMENT_COMPLETED).await?;
    }
    Ok(Json(completed))
}
