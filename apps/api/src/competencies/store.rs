//! Competency dictionary persistence.
//!
//! Rows are owned by a tenant or, with `tenant_id = NULL`, by the global
//! catalog. Codes are matched case-insensitively. Reads for a tenant see its
//! own rows first, then global ones.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::competency::CompetencyRow;

const UNIQUE_VIOLATION: &str = "23505";

pub struct NewCompetency<'a> {
    pub tenant_id: Option<Uuid>,
    pub code: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub meta_competency: Option<&'a str>,
    pub category: Option<&'a str>,
    pub industry: Option<&'a str>,
    pub role_category: Option<&'a str>,
    pub translations: Option<&'a serde_json::Value>,
}

/// Fields left `None` keep their stored value.
#[derive(Debug, Default)]
pub struct CompetencyChanges<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub meta_competency: Option<&'a str>,
    pub category: Option<&'a str>,
    pub industry: Option<&'a str>,
    pub role_category: Option<&'a str>,
    pub translations: Option<&'a serde_json::Value>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default)]
pub struct CompetencyFilter {
    pub tenant_id: Option<Uuid>,
    pub include_global: bool,
    pub include_inactive: bool,
    pub category: Option<String>,
    pub meta_competency: Option<String>,
}

pub async fn insert_competency(
    pool: &PgPool,
    new: NewCompetency<'_>,
) -> Result<CompetencyRow, AppError> {
    let row = sqlx::query_as::<_, CompetencyRow>(
        r#"
        INSERT INTO competency_dictionaries
            (tenant_id, competency_code, competency_name, competency_description,
             meta_competency, category, industry, role_category, translations)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(new.tenant_id)
    .bind(new.code)
    .bind(new.name)
    .bind(new.description)
    .bind(new.meta_competency)
    .bind(new.category)
    .bind(new.industry)
    .bind(new.role_category)
    .bind(new.translations)
    .fetch_one(pool)
    .await
    .map_err(|e| conflict_on_duplicate(e, new.code))?;

    info!(
        "Created competency {} ({}) for tenant {:?}",
        row.competency_code, row.id, row.tenant_id
    );
    Ok(row)
}

pub async fn list_competencies(
    pool: &PgPool,
    filter: &CompetencyFilter,
) -> Result<Vec<CompetencyRow>, AppError> {
    Ok(sqlx::query_as::<_, CompetencyRow>(
        r#"
        SELECT * FROM competency_dictionaries
        WHERE (tenant_id IS NOT DISTINCT FROM $1 OR ($2 AND tenant_id IS NULL))
          AND ($3 OR is_active)
          AND ($4::text IS NULL OR category = $4)
          AND ($5::text IS NULL OR meta_competency = $5)
        ORDER BY tenant_id NULLS LAST, competency_code
        "#,
    )
    .bind(filter.tenant_id)
    .bind(filter.include_global)
    .bind(filter.include_inactive)
    .bind(filter.category.as_deref())
    .bind(filter.meta_competency.as_deref())
    .fetch_all(pool)
    .await?)
}

/// Active entries visible to a tenant, tenant rows first. Used to annotate
/// analysis reports.
pub async fn load_catalog(
    pool: &PgPool,
    tenant_id: Option<Uuid>,
) -> Result<Vec<CompetencyRow>, AppError> {
    list_competencies(
        pool,
        &CompetencyFilter {
            tenant_id,
            include_global: true,
            ..Default::default()
        },
    )
    .await
}

/// The tenant's entry for `code`, else the global one.
pub async fn find_competency(
    pool: &PgPool,
    tenant_id: Option<Uuid>,
    code: &str,
) -> Result<CompetencyRow, AppError> {
    sqlx::query_as::<_, CompetencyRow>(
        r#"
        SELECT * FROM competency_dictionaries
        WHERE lower(competency_code) = lower($1)
          AND (tenant_id IS NOT DISTINCT FROM $2 OR tenant_id IS NULL)
        ORDER BY tenant_id NULLS LAST
        LIMIT 1
        "#,
    )
    .bind(code)
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| not_found(code))
}

/// Updates the entry owned by `tenant_id` (the global entry when `None`).
pub async fn update_competency(
    pool: &PgPool,
    tenant_id: Option<Uuid>,
    code: &str,
    changes: &CompetencyChanges<'_>,
) -> Result<CompetencyRow, AppError> {
    let row = sqlx::query_as::<_, CompetencyRow>(
        r#"
        UPDATE competency_dictionaries
        SET competency_name = COALESCE($3, competency_name),
            competency_description = COALESCE($4, competency_description),
            meta_competency = COALESCE($5, meta_competency),
            category = COALESCE($6, category),
            industry = COALESCE($7, industry),
            role_category = COALESCE($8, role_category),
            translations = COALESCE($9, translations),
            is_active = COALESCE($10, is_active),
            updated_at = now()
        WHERE lower(competency_code) = lower($1) AND tenant_id IS NOT DISTINCT FROM $2
        RETURNING *
        "#,
    )
    .bind(code)
    .bind(tenant_id)
    .bind(changes.name)
    .bind(changes.description)
    .bind(changes.meta_competency)
    .bind(changes.category)
    .bind(changes.industry)
    .bind(changes.role_category)
    .bind(changes.translations)
    .bind(changes.is_active)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| not_found(code))?;

    info!("Updated competency {} ({})", row.competency_code, row.id);
    Ok(row)
}

/// Soft delete unless `hard` is set.
pub async fn delete_competency(
    pool: &PgPool,
    tenant_id: Option<Uuid>,
    code: &str,
    hard: bool,
) -> Result<(), AppError> {
    let sql = if hard {
        r#"
        DELETE FROM competency_dictionaries
        WHERE lower(competency_code) = lower($1) AND tenant_id IS NOT DISTINCT FROM $2
        "#
    } else {
        r#"
        UPDATE competency_dictionaries SET is_active = FALSE, updated_at = now()
        WHERE lower(competency_code) = lower($1) AND tenant_id IS NOT DISTINCT FROM $2
        "#
    };
    let result = sqlx::query(sql).bind(code).bind(tenant_id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(not_found(code));
    }

    info!(
        "{} competency {code} (tenant {tenant_id:?})",
        if hard { "Deleted" } else { "Deactivated" }
    );
    Ok(())
}

fn not_found(code: &str) -> AppError {
    AppError::NotFound(format!("Competency '{code}' not found"))
}

fn conflict_on_duplicate(err: sqlx::Error, code: &str) -> AppError {
    match err {
        sqlx::Error::Database(ref db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            AppError::Conflict(format!("Competency code '{code}' already exists"))
        }
        other => AppError::Database(other),
    }
}
