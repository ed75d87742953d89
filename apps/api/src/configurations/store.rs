use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::cache;
use crate::errors::AppError;
use crate::models::configuration::{ConfigScope, ConfigType, ConfigurationRow};

pub struct NewConfiguration<'a> {
    pub tenant_id: Option<Uuid>,
    pub config_type: ConfigType,
    pub scope: ConfigScope,
    pub config_data: &'a serde_json::Value,
}

#[derive(Debug, Default)]
pub struct ConfigFilter {
    pub tenant_id: Option<Uuid>,
    pub config_type: Option<ConfigType>,
    pub scope: Option<ConfigScope>,
    pub active_only: bool,
}

/// Inserts a new active configuration, retiring the owner's previous active
/// row of the same type. Versions increase per (owner, type, scope).
pub async fn create_configuration(
    pool: &PgPool,
    new: NewConfiguration<'_>,
) -> Result<ConfigurationRow, AppError> {
    let mut tx = pool.begin().await?;

    let current_max: Option<i32> = sqlx::query_scalar(
        r#"
        SELECT MAX(version) FROM configurations
        WHERE tenant_id IS NOT DISTINCT FROM $1 AND config_type = $2 AND scope = $3
        "#,
    )
    .bind(new.tenant_id)
    .bind(new.config_type.as_str())
    .bind(new.scope.as_str())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE configurations SET is_active = FALSE, updated_at = now()
        WHERE tenant_id IS NOT DISTINCT FROM $1 AND config_type = $2 AND scope = $3 AND is_active
        "#,
    )
    .bind(new.tenant_id)
    .bind(new.config_type.as_str())
    .bind(new.scope.as_str())
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query_as::<_, ConfigurationRow>(
        r#"
        INSERT INTO configurations (tenant_id, config_type, scope, config_data, version, is_active)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        RETURNING *
        "#,
    )
    .bind(new.tenant_id)
    .bind(new.config_type.as_str())
    .bind(new.scope.as_str())
    .bind(new.config_data)
    .bind(current_max.unwrap_or(0) + 1)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        "Created {} configuration {} v{} (tenant {:?})",
        row.config_type, row.id, row.version, row.tenant_id
    );
    Ok(row)
}

/// Tenant rows plus system-scoped rows, newest first.
pub async fn list_configurations(
    pool: &PgPool,
    filter: &ConfigFilter,
) -> Result<Vec<ConfigurationRow>, AppError> {
    Ok(sqlx::query_as::<_, ConfigurationRow>(
        r#"
        SELECT * FROM configurations
        WHERE ($1::uuid IS NULL OR tenant_id = $1 OR scope = 'system')
          AND ($2::text IS NULL OR config_type = $2)
          AND ($3::text IS NULL OR scope = $3)
          AND (NOT $4 OR is_active)
        ORDER BY created_at DESC
        "#,
    )
    .bind(filter.tenant_id)
    .bind(filter.config_type.map(|t| t.as_str()))
    .bind(filter.scope.map(|s| s.as_str()))
    .bind(filter.active_only)
    .fetch_all(pool)
    .await?)
}

pub async fn get_configuration(pool: &PgPool, id: Uuid) -> Result<ConfigurationRow, AppError> {
    sqlx::query_as::<_, ConfigurationRow>("SELECT * FROM configurations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Configuration {id} not found")))
}

/// Replaces `config_data` in place and bumps the version.
pub async fn update_configuration(
    pool: &PgPool,
    id: Uuid,
    config_data: &serde_json::Value,
) -> Result<ConfigurationRow, AppError> {
    let row = sqlx::query_as::<_, ConfigurationRow>(
        r#"
        UPDATE configurations
        SET config_data = $2, version = version + 1, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(config_data)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Configuration {id} not found")))?;

    info!("Updated configuration {id} to v{}", row.version);
    Ok(row)
}

/// Soft delete.
pub async fn deactivate_configuration(
    pool: &PgPool,
    id: Uuid,
) -> Result<ConfigurationRow, AppError> {
    let row = sqlx::query_as::<_, ConfigurationRow>(
        r#"
        UPDATE configurations SET is_active = FALSE, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Configuration {id} not found")))?;

    info!("Deactivated configuration {id}");
    Ok(row)
}

/// Tenant-specific active row first, then the system-scoped one.
pub async fn find_active_configuration(
    pool: &PgPool,
    tenant_id: Option<Uuid>,
    config_type: ConfigType,
) -> Result<Option<ConfigurationRow>, AppError> {
    Ok(sqlx::query_as::<_, ConfigurationRow>(
        r#"
        SELECT * FROM configurations
        WHERE config_type = $2
          AND is_active
          AND ((scope = 'tenant' AND tenant_id = $1) OR scope = 'system')
        ORDER BY (scope = 'tenant') DESC, version DESC, created_at DESC
        LIMIT 1
        "#,
    )
    .bind(tenant_id)
    .bind(config_type.as_str())
    .fetch_optional(pool)
    .await?)
}

/// `find_active_configuration` behind the Redis cache.
pub async fn get_active_configuration(
    pool: &PgPool,
    redis: &redis::Client,
    ttl_secs: u64,
    tenant_id: Option<Uuid>,
    config_type: ConfigType,
) -> Result<Option<ConfigurationRow>, AppError> {
    let key = cache::active_config_key(tenant_id, config_type);
    if let Some(row) = cache::get_json::<ConfigurationRow>(redis, &key).await {
        return Ok(Some(row));
    }

    let row = find_active_configuration(pool, tenant_id, config_type).await?;
    if let Some(row) = &row {
        cache::set_json(redis, &key, row, ttl_secs).await;
    }
    Ok(row)
}

/// Drops the cached active row for the owner of `row`.
pub async fn invalidate_cached(redis: &redis::Client, row: &ConfigurationRow) {
    let Some(config_type) = ConfigType::parse(&row.config_type) else {
        return;
    };
    cache::invalidate(redis, &cache::active_config_key(row.tenant_id, config_type)).await;
}
