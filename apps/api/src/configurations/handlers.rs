use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::configurations::store::{
    create_configuration, deactivate_configuration, get_active_configuration, get_configuration,
    invalidate_cached, list_configurations, update_configuration, ConfigFilter, NewConfiguration,
};
use crate::configurations::validation::validate_config_data;
use crate::errors::AppError;
use crate::models::configuration::{ConfigScope, ConfigType, ConfigurationRow};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateConfigurationRequest {
    pub tenant_id: Option<Uuid>,
    pub config_type: ConfigType,
    #[serde(default)]
    pub scope: ConfigScope,
    pub config_data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConfigurationRequest {
    pub config_data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ConfigListQuery {
    pub tenant_id: Option<Uuid>,
    pub config_type: Option<ConfigType>,
    pub scope: Option<ConfigScope>,
    pub active_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: Option<Uuid>,
}

/// POST /api/v1/configurations
pub async fn handle_create_configuration(
    State(state): State<AppState>,
    Json(req): Json<CreateConfigurationRequest>,
) -> Result<(StatusCode, Json<ConfigurationRow>), AppError> {
    let tenant_id = match (req.scope, req.tenant_id) {
        (ConfigScope::System, _) => None,
        (ConfigScope::Tenant, Some(id)) => Some(id),
        (ConfigScope::Tenant, None) => {
            return Err(AppError::Validation(
                "tenant_id is required for tenant-scoped configurations".to_string(),
            ))
        }
    };

    validate_config_data(req.config_type, &req.config_data)?;

    let row = create_configuration(
        &state.db,
        NewConfiguration {
            tenant_id,
            config_type: req.config_type,
            scope: req.scope,
            config_data: &req.config_data,
        },
    )
    .await?;
    invalidate_cached(&state.redis, &row).await;

    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/configurations
pub async fn handle_list_configurations(
    State(state): State<AppState>,
    Query(params): Query<ConfigListQuery>,
) -> Result<Json<Vec<ConfigurationRow>>, AppError> {
    let filter = ConfigFilter {
        tenant_id: params.tenant_id,
        config_type: params.config_type,
        scope: params.scope,
        active_only: params.active_only.unwrap_or(true),
    };
    Ok(Json(list_configurations(&state.db, &filter).await?))
}

/// GET /api/v1/configurations/active/:config_type
pub async fn handle_get_active_configuration(
    State(state): State<AppState>,
    Path(config_type): Path<String>,
    Query(params): Query<TenantQuery>,
) -> Result<Json<ConfigurationRow>, AppError> {
    let config_type = ConfigType::parse(&config_type)
        .ok_or_else(|| AppError::Validation(format!("Unknown config type '{config_type}'")))?;

    get_active_configuration(
        &state.db,
        &state.redis,
        state.config.config_cache_ttl_secs,
        params.tenant_id,
        config_type,
    )
    .await?
    .map(Json)
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "No active {} configuration",
            config_type.as_str()
        ))
    })
}

/// GET /api/v1/configurations/:id
pub async fn handle_get_configuration(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConfigurationRow>, AppError> {
    Ok(Json(get_configuration(&state.db, id).await?))
}

/// PUT /api/v1/configurations/:id
pub async fn handle_update_configuration(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateConfigurationRequest>,
) -> Result<Json<ConfigurationRow>, AppError> {
    let existing = get_configuration(&state.db, id).await?;
    let config_type = ConfigType::parse(&existing.config_type).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "Configuration {id} has unknown type '{}'",
            existing.config_type
        ))
    })?;
    validate_config_data(config_type, &req.config_data)?;

    let row = update_configuration(&state.db, id, &req.config_data).await?;
    invalidate_cached(&state.redis, &row).await;
    Ok(Json(row))
}

/// DELETE /api/v1/configurations/:id
pub async fn handle_deactivate_configuration(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let row = deactivate_configuration(&state.db, id).await?;
    invalidate_cached(&state.redis, &row).await;
    Ok(StatusCode::NO_CONTENT)
}
