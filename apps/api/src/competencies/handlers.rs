use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::competencies::store::{
    delete_competency, find_competency, insert_competency, list_competencies, update_competency,
    CompetencyChanges, CompetencyFilter, NewCompetency,
};
use crate::errors::AppError;
use crate::models::competency::CompetencyRow;
use crate::state::AppState;

const MAX_CODE_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateCompetencyRequest {
    pub tenant_id: Option<Uuid>,
    pub competency_code: String,
    pub competency_name: String,
    #[serde(default)]
    pub competency_description: Option<String>,
    #[serde(default)]
    pub meta_competency: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub role_category: Option<String>,
    #[serde(default)]
    pub translations: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCompetencyRequest {
    pub competency_name: Option<String>,
    pub competency_description: Option<String>,
    pub meta_competency: Option<String>,
    pub category: Option<String>,
    pub industry: Option<String>,
    pub role_category: Option<String>,
    pub translations: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CompetencyListQuery {
    pub tenant_id: Option<Uuid>,
    pub include_global: Option<bool>,
    pub include_inactive: Option<bool>,
    pub category: Option<String>,
    pub meta_competency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompetencyOwnerQuery {
    pub tenant_id: Option<Uuid>,
    #[serde(default)]
    pub hard: bool,
}

/// Trimmed code; empty, over-long or whitespace-containing codes are rejected.
pub fn normalize_code(code: &str) -> Result<&str, AppError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AppError::Validation("competency_code is required".to_string()));
    }
    if code.len() > MAX_CODE_LEN || code.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(format!(
            "competency_code must be at most {MAX_CODE_LEN} characters without spaces"
        )));
    }
    Ok(code)
}

/// POST /api/v1/competencies
pub async fn handle_create_competency(
    State(state): State<AppState>,
    Json(req): Json<CreateCompetencyRequest>,
) -> Result<(StatusCode, Json<CompetencyRow>), AppError> {
    let code = normalize_code(&req.competency_code)?;
    let name = req.competency_name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("competency_name is required".to_string()));
    }
    if req.translations.as_ref().is_some_and(|t| !t.is_object()) {
        return Err(AppError::Validation(
            "translations must be a JSON object keyed by language".to_string(),
        ));
    }

    let row = insert_competency(
        &state.db,
        NewCompetency {
            tenant_id: req.tenant_id,
            code,
            name,
            description: req.competency_description.as_deref(),
            meta_competency: req.meta_competency.as_deref(),
            category: req.category.as_deref(),
            industry: req.industry.as_deref(),
            role_category: req.role_category.as_deref(),
            translations: req.translations.as_ref(),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/competencies
pub async fn handle_list_competencies(
    State(state): State<AppState>,
    Query(params): Query<CompetencyListQuery>,
) -> Result<Json<Vec<CompetencyRow>>, AppError> {
    let filter = CompetencyFilter {
        tenant_id: params.tenant_id,
        include_global: params.include_global.unwrap_or(true),
        include_inactive: params.include_inactive.unwrap_or(false),
        category: params.category,
        meta_competency: params.meta_competency,
    };
    Ok(Json(list_competencies(&state.db, &filter).await?))
}

/// GET /api/v1/competencies/:code
pub async fn handle_get_competency(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(owner): Query<CompetencyOwnerQuery>,
) -> Result<Json<CompetencyRow>, AppError> {
    let code = normalize_code(&code)?;
    Ok(Json(find_competency(&state.db, owner.tenant_id, code).await?))
}

/// PUT /api/v1/competencies/:code
pub async fn handle_update_competency(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(owner): Query<CompetencyOwnerQuery>,
    Json(req): Json<UpdateCompetencyRequest>,
) -> Result<Json<CompetencyRow>, AppError> {
    let code = normalize_code(&code)?;
    if req
        .competency_name
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(AppError::Validation(
            "competency_name cannot be empty".to_string(),
        ));
    }

    let changes = CompetencyChanges {
        name: req.competency_name.as_deref().map(str::trim),
        description: req.competency_description.as_deref(),
        meta_competency: req.meta_competency.as_deref(),
        category: req.category.as_deref(),
        industry: req.industry.as_deref(),
        role_category: req.role_category.as_deref(),
        translations: req.translations.as_ref(),
        is_active: req.is_active,
    };
    Ok(Json(
        update_competency(&state.db, owner.tenant_id, code, &changes).await?,
    ))
}

/// DELETE /api/v1/competencies/:code
pub async fn handle_delete_competency(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(owner): Query<CompetencyOwnerQuery>,
) -> Result<StatusCode, AppError> {
    let code = normalize_code(&code)?;
    delete_competency(&state.db, owner.tenant_id, code, owner.hard).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code_trims_and_rejects_blank() {
        assert_eq!(normalize_code("  COMM ").unwrap(), "COMM");
        assert!(matches!(normalize_code("   "), Err(AppError::Validation(_))));
        assert!(normalize_code("two words").is_err());
        assert!(normalize_code(&"x".repeat(MAX_CODE_LEN + 1)).is_err());
    }
}
