use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::assignments::store::{
    delete_assignment, list_assignments, update_assignment, upsert_assignment, AssignmentChanges,
    AssignmentFilter, NewAssignment,
};
use crate::errors::AppError;
use crate::models::assignment::{TestAssignmentRow, ASSIGNMENT_STATUSES};
use crate::models::configuration::{TestType, DEFAULT_MAX_ATTEMPTS};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAssignmentRequest {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub test_type: TestType,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_attempts: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAssignmentRequest {
    pub status: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub max_attempts: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentListQuery {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub test_type: Option<TestType>,
    pub status: Option<String>,
}

fn validate_max_attempts(max_attempts: Option<i32>) -> Result<(), AppError> {
    match max_attempts {
        Some(n) if n < 1 => Err(AppError::Validation(
            "max_attempts must be at least 1".to_string(),
        )),
        _ => Ok(()),
    }
}

fn validate_status(status: Option<&str>) -> Result<(), AppError> {
    match status {
        Some(s) if !ASSIGNMENT_STATUSES.contains(&s) => Err(AppError::Validation(format!(
            "status must be one of {}",
            ASSIGNMENT_STATUSES.join(", ")
        ))),
        _ => Ok(()),
    }
}

/// POST /api/v1/assignments
pub async fn handle_create_assignment(
    State(state): State<AppState>,
    Json(req): Json<CreateAssignmentRequest>,
) -> Result<(StatusCode, Json<TestAssignmentRow>), AppError> {
    validate_max_attempts(req.max_attempts)?;

    let row = upsert_assignment(
        &state.db,
        NewAssignment {
            user_id: req.user_id,
            tenant_id: req.tenant_id,
            test_type: req.test_type,
            due_date: req.due_date,
            max_attempts: req.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS as i32),
            notes: req.notes.as_deref(),
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/assignments
pub async fn handle_list_assignments(
    State(state): State<AppState>,
    Query(params): Query<AssignmentListQuery>,
) -> Result<Json<Vec<TestAssignmentRow>>, AppError> {
    validate_status(params.status.as_deref())?;
    let filter = AssignmentFilter {
        tenant_id: params.tenant_id,
        user_id: params.user_id,
        test_type: params.test_type,
        status: params.status,
    };
    Ok(Json(list_assignments(&state.db, &filter).await?))
}

/// PUT /api/v1/assignments/:id
pub async fn handle_update_assignment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAssignmentRequest>,
) -> Result<Json<TestAssignmentRow>, AppError> {
    validate_status(req.status.as_deref())?;
    validate_max_attempts(req.max_attempts)?;

    let changes = AssignmentChanges {
        status: req.status.as_deref(),
        due_date: req.due_date,
        max_attempts: req.max_attempts,
        notes: req.notes.as_deref(),
    };
    Ok(Json(update_assignment(&state.db, id, &changes).await?))
}

/// DELETE /api/v1/assignments/:id
pub async fn handle_delete_assignment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    delete_assignment(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_must_be_known() {
        assert!(validate_status(Some("cancelled")).is_ok());
        assert!(validate_status(None).is_ok());
        assert!(matches!(
            validate_status(Some("archived")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_max_attempts_must_be_positive() {
        assert!(validate_max_attempts(Some(1)).is_ok());
        assert!(validate_max_attempts(None).is_ok());
        assert!(validate_max_attempts(Some(0)).is_err());
    }
}
