use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::configuration::TestType;
use crate::models::records::{TestAttemptRow, STATUS_COMPLETED, STATUS_IN_PROGRESS};

const LIST_LIMIT: i64 = 100;

pub struct NewAttempt<'a> {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub test_type: TestType,
    pub attempt_number: i32,
    pub questions_snapshot: &'a serde_json::Value,
    pub attempt_metadata: &'a serde_json::Value,
    pub max_questions: i32,
}

pub async fn count_attempts(
    pool: &PgPool,
    user_id: Uuid,
    test_type: TestType,
    status: Option<&str>,
) -> Result<i64, AppError> {
    Ok(sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM test_attempts
        WHERE user_id = $1 AND test_type = $2 AND ($3::text IS NULL OR status = $3)
        "#,
    )
    .bind(user_id)
    .bind(test_type.as_str())
    .bind(status)
    .fetch_one(pool)
    .await?)
}

pub async fn find_in_progress(
    pool: &PgPool,
    user_id: Uuid,
    test_type: TestType,
) -> Result<Option<TestAttemptRow>, AppError> {
    Ok(sqlx::query_as::<_, TestAttemptRow>(
        r#"
        SELECT * FROM test_attempts
        WHERE user_id = $1 AND test_type = $2 AND status = $3
        ORDER BY started_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(test_type.as_str())
    .bind(STATUS_IN_PROGRESS)
    .fetch_optional(pool)
    .await?)
}

pub async fn insert_attempt(pool: &PgPool, new: NewAttempt<'_>) -> Result<TestAttemptRow, AppError> {
    let row = sqlx::query_as::<_, TestAttemptRow>(
        r#"
        INSERT INTO test_attempts
            (user_id, tenant_id, test_type, attempt_number, status,
             max_questions, questions_snapshot, attempt_metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(new.user_id)
    .bind(new.tenant_id)
    .bind(new.test_type.as_str())
    .bind(new.attempt_number)
    .bind(STATUS_IN_PROGRESS)
    .bind(new.max_questions)
    .bind(new.questions_snapshot)
    .bind(new.attempt_metadata)
    .fetch_one(pool)
    .await?;

    info!(
        "Started {} attempt #{} ({}) for user {}",
        row.test_type, row.attempt_number, row.id, row.user_id
    );
    Ok(row)
}

pub async fn get_attempt(pool: &PgPool, id: Uuid) -> Result<TestAttemptRow, AppError> {
    sqlx::query_as::<_, TestAttemptRow>("SELECT * FROM test_attempts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt {id} not found")))
}

pub async fn list_attempts(
    pool: &PgPool,
    user_id: Uuid,
    test_type: Option<TestType>,
    status: Option<&str>,
) -> Result<Vec<TestAttemptRow>, AppError> {
    Ok(sqlx::query_as::<_, TestAttemptRow>(
        r#"
        SELECT * FROM test_attempts
        WHERE user_id = $1
          AND ($2::text IS NULL OR test_type = $2)
          AND ($3::text IS NULL OR status = $3)
        ORDER BY started_at DESC
        LIMIT $4
        "#,
    )
    .bind(user_id)
    .bind(test_type.map(|t| t.as_str()))
    .bind(status)
    .bind(LIST_LIMIT)
    .fetch_all(pool)
    .await?)
}

/// Marks an in-progress attempt completed. Finalized attempts are rejected.
pub async fn complete_attempt(
    pool: &PgPool,
    id: Uuid,
    attempt_metadata: &serde_json::Value,
) -> Result<TestAttemptRow, AppError> {
    let row = sqlx::query_as::<_, TestAttemptRow>(
        r#"
        UPDATE test_attempts
        SET status = $2, completed_at = now(), attempt_metadata = $3
        WHERE id = $1 AND status = $4
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(STATUS_COMPLETED)
    .bind(attempt_metadata)
    .bind(STATUS_IN_PROGRESS)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            info!("Completed attempt {id}");
            Ok(row)
        }
        None => {
            // Distinguish a missing attempt from one that is already finalized.
            get_attempt(pool, id).await?;
            Err(AppError::Validation(format!("Attempt {id} is already finalized")))
        }
    }
}
