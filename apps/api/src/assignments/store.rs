use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::assignment::{TestAssignmentRow, ASSIGNMENT_ASSIGNED};
use crate::models::configuration::TestType;

pub struct NewAssignment<'a> {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub test_type: TestType,
    pub due_date: Option<DateTime<Utc>>,
    pub max_attempts: i32,
    pub notes: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct AssignmentChanges<'a> {
    pub status: Option<&'a str>,
    pub due_date: Option<DateTime<Utc>>,
    pub max_attempts: Option<i32>,
    pub notes: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct AssignmentFilter {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub test_type: Option<TestType>,
    pub status: Option<String>,
}

/// Assigns a test type to a user. Re-assigning replaces the previous
/// assignment's terms and reopens it.
pub async fn upsert_assignment(
    pool: &PgPool,
    new: NewAssignment<'_>,
) -> Result<TestAssignmentRow, AppError> {
    let row = sqlx::query_as::<_, TestAssignmentRow>(
        r#"
        INSERT INTO test_assignments (user_id, tenant_id, test_type, due_date, max_attempts, notes, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (user_id, test_type) DO UPDATE
        SET tenant_id = EXCLUDED.tenant_id,
            due_date = EXCLUDED.due_date,
            max_attempts = EXCLUDED.max_attempts,
            notes = EXCLUDED.notes,
            status = EXCLUDED.status,
            assigned_at = now(),
            started_at = NULL,
            completed_at = NULL,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(new.user_id)
    .bind(new.tenant_id)
    .bind(new.test_type.as_str())
    .bind(new.due_date)
    .bind(new.max_attempts)
    .bind(new.notes)
    .bind(ASSIGNMENT_ASSIGNED)
    .fetch_one(pool)
    .await?;

    info!(
        "Assigned {} to user {} (max {} attempts)",
        row.test_type, row.user_id, row.max_attempts
    );
    Ok(row)
}

pub async fn find_assignment(
    pool: &PgPool,
    user_id: Uuid,
    test_type: TestType,
) -> Result<Option<TestAssignmentRow>, AppError> {
    Ok(sqlx::query_as::<_, TestAssignmentRow>(
        "SELECT * FROM test_assignments WHERE user_id = $1 AND test_type = $2",
    )
    .bind(user_id)
    .bind(test_type.as_str())
    .fetch_optional(pool)
    .await?)
}

pub async fn list_assignments(
    pool: &PgPool,
    filter: &AssignmentFilter,
) -> Result<Vec<TestAssignmentRow>, AppError> {
    Ok(sqlx::query_as::<_, TestAssignmentRow>(
        r#"
        SELECT * FROM test_assignments
        WHERE ($1::uuid IS NULL OR tenant_id = $1)
          AND ($2::uuid IS NULL OR user_id = $2)
          AND ($3::text IS NULL OR test_type = $3)
          AND ($4::text IS NULL OR status = $4)
        ORDER BY assigned_at DESC
        "#,
    )
    .bind(filter.tenant_id)
    .bind(filter.user_id)
    .bind(filter.test_type.map(|t| t.as_str()))
    .bind(filter.status.as_deref())
    .fetch_all(pool)
    .await?)
}

pub async fn update_assignment(
    pool: &PgPool,
    id: Uuid,
    changes: &AssignmentChanges<'_>,
) -> Result<TestAssignmentRow, AppError> {
    let row = sqlx::query_as::<_, TestAssignmentRow>(
        r#"
        UPDATE test_assignments
        SET status = COALESCE($2, status),
            due_date = COALESCE($3, due_date),
            max_attempts = COALESCE($4, max_attempts),
            notes = COALESCE($5, notes),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(changes.status)
    .bind(changes.due_date)
    .bind(changes.max_attempts)
    .bind(changes.notes)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Assignment {id} not found")))?;

    info!("Updated assignment {id} (status {})", row.status);
    Ok(row)
}

pub async fn delete_assignment(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM test_assignments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Assignment {id} not found")));
    }
    info!("Deleted assignment {id}");
    Ok(())
}

/// Moves the user's assignment to `status`, stamping `started_at` or
/// `completed_at` when those are the target. No-op without an assignment.
pub async fn record_progress(
    pool: &PgPool,
    user_id: Uuid,
    test_type: TestType,
    status: &str,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE test_assignments
        SET status = $3,
            started_at = CASE WHEN $3 = 'started' THEN COALESCE(started_at, now()) ELSE started_at END,
            completed_at = CASE WHEN $3 = 'completed' THEN now() ELSE completed_at END,
            updated_at = now()
        WHERE user_id = $1 AND test_type = $2 AND status NOT IN ('cancelled', 'overdue')
        "#,
    )
    .bind(user_id)
    .bind(test_type.as_str())
    .bind(status)
    .execute(pool)
    .await?;
    Ok(())
}
