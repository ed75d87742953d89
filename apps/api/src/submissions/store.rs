use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::configuration::TestType;
use crate::models::records::{
    SubmissionRow, SUBMISSION_ANALYZING, SUBMISSION_COMPLETED, SUBMISSION_FAILED,
    SUBMISSION_SUBMITTED,
};

const LIST_LIMIT: i64 = 200;

pub struct NewSubmission<'a> {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub attempt_id: Option<Uuid>,
    pub test_type: TestType,
    pub candidate_name: &'a str,
    pub conversation_history: &'a serde_json::Value,
    pub counts: QuestionCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestionCounts {
    pub total: i32,
    pub base: i32,
    pub follow_up: i32,
}

#[derive(Debug, Default)]
pub struct SubmissionFilter {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub test_type: Option<TestType>,
    pub status: Option<String>,
}

pub async fn insert_submission(
    pool: &PgPool,
    new: NewSubmission<'_>,
) -> Result<SubmissionRow, AppError> {
    let row = sqlx::query_as::<_, SubmissionRow>(
        r#"
        INSERT INTO submissions
            (user_id, tenant_id, attempt_id, test_type, candidate_name, conversation_history,
             total_questions, base_questions, follow_up_questions, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(new.user_id)
    .bind(new.tenant_id)
    .bind(new.attempt_id)
    .bind(new.test_type.as_str())
    .bind(new.candidate_name)
    .bind(new.conversation_history)
    .bind(new.counts.total)
    .bind(new.counts.base)
    .bind(new.counts.follow_up)
    .bind(SUBMISSION_SUBMITTED)
    .fetch_one(pool)
    .await?;

    info!(
        "Stored {} submission {} ({} questions, {} follow-ups)",
        row.test_type, row.id, row.total_questions, row.follow_up_questions
    );
    Ok(row)
}

pub async fn get_submission(pool: &PgPool, id: Uuid) -> Result<SubmissionRow, AppError> {
    sqlx::query_as::<_, SubmissionRow>("SELECT * FROM submissions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Submission {id} not found")))
}

pub async fn list_submissions(
    pool: &PgPool,
    filter: &SubmissionFilter,
) -> Result<Vec<SubmissionRow>, AppError> {
    Ok(sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT * FROM submissions
        WHERE ($1::uuid IS NULL OR tenant_id = $1)
          AND ($2::uuid IS NULL OR user_id = $2)
          AND ($3::text IS NULL OR test_type = $3)
          AND ($4::text IS NULL OR status = $4)
        ORDER BY created_at DESC
        LIMIT $5
        "#,
    )
    .bind(filter.tenant_id)
    .bind(filter.user_id)
    .bind(filter.test_type.map(|t| t.as_str()))
    .bind(filter.status.as_deref())
    .bind(LIST_LIMIT)
    .fetch_all(pool)
    .await?)
}

/// Analyzed submissions, newest analysis first.
pub async fn list_analyzed(
    pool: &PgPool,
    filter: &SubmissionFilter,
) -> Result<Vec<SubmissionRow>, AppError> {
    Ok(sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT * FROM submissions
        WHERE analysis_completed
          AND ($1::uuid IS NULL OR tenant_id = $1)
          AND ($2::uuid IS NULL OR user_id = $2)
          AND ($3::text IS NULL OR test_type = $3)
        ORDER BY analysis_completed_at DESC NULLS LAST
        LIMIT $4
        "#,
    )
    .bind(filter.tenant_id)
    .bind(filter.user_id)
    .bind(filter.test_type.map(|t| t.as_str()))
    .bind(LIST_LIMIT)
    .fetch_all(pool)
    .await?)
}

/// Flips a submission to `analyzing` unless another run already holds it.
/// Returns `None` when the row is missing or already claimed.
pub async fn claim_for_analysis(pool: &PgPool, id: Uuid) -> Result<Option<SubmissionRow>, AppError> {
    Ok(sqlx::query_as::<_, SubmissionRow>(
        r#"
        UPDATE submissions
        SET status = $2, updated_at = now()
        WHERE id = $1 AND status <> $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(SUBMISSION_ANALYZING)
    .fetch_optional(pool)
    .await?)
}

/// Most recent submission for a user and test type.
pub async fn latest_submission(
    pool: &PgPool,
    user_id: Uuid,
    test_type: TestType,
) -> Result<Option<SubmissionRow>, AppError> {
    Ok(sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT * FROM submissions
        WHERE user_id = $1 AND test_type = $2
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(test_type.as_str())
    .fetch_optional(pool)
    .await?)
}

pub async fn count_submissions(
    pool: &PgPool,
    user_id: Uuid,
    test_type: TestType,
) -> Result<i64, AppError> {
    Ok(sqlx::query_scalar(
        "SELECT COUNT(*) FROM submissions WHERE user_id = $1 AND test_type = $2",
    )
    .bind(user_id)
    .bind(test_type.as_str())
    .fetch_one(pool)
    .await?)
}

pub async fn mark_failed(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE submissions SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(SUBMISSION_FAILED)
        .execute(pool)
        .await?;
    Ok(())
}

/// Persists the analysis and the annotated conversation in one statement.
pub async fn save_analysis(
    pool: &PgPool,
    id: Uuid,
    analysis_result: &serde_json::Value,
    conversation_history: &serde_json::Value,
) -> Result<SubmissionRow, AppError> {
    let row = sqlx::query_as::<_, SubmissionRow>(
        r#"
        UPDATE submissions
        SET analysis_result = $2,
            conversation_history = $3,
            status = $4,
            analysis_completed = TRUE,
            analysis_completed_at = now(),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(analysis_result)
    .bind(conversation_history)
    .bind(SUBMISSION_COMPLETED)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Submission {id} not found")))?;

    info!("Analysis stored for submission {id}");
    Ok(row)
}
