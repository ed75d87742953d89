//! Redis read-through cache for active configurations.
//!
//! Cache trouble is never a request failure: every error is logged at `warn`
//! and treated as a miss, and the caller falls through to PostgreSQL.

use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::configuration::ConfigType;

const KEY_PREFIX: &str = "assessor:config:active";

/// `assessor:config:active:{tenant|system}:{config_type}`
pub fn active_config_key(tenant_id: Option<Uuid>, config_type: ConfigType) -> String {
    let owner = tenant_id.map_or_else(|| "system".to_string(), |id| id.to_string());
    format!("{KEY_PREFIX}:{owner}:{}", config_type.as_str())
}

pub async fn get_json<T: DeserializeOwned>(client: &redis::Client, key: &str) -> Option<T> {
    let result: redis::RedisResult<Option<String>> = async {
        let mut conn = client.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }
    .await;

    match result {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit for {key}");
                Some(value)
            }
            Err(e) => {
                warn!("Discarding unreadable cache entry {key}: {e}");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!("Cache read for {key} failed: {e}");
            None
        }
    }
}

pub async fn set_json<T: Serialize>(client: &redis::Client, key: &str, value: &T, ttl_secs: u64) {
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Could not serialize cache entry {key}: {e}");
            return;
        }
    };

    let result: redis::RedisResult<()> = async {
        let mut conn = client.get_multiplexed_async_connection().await?;
        conn.set_ex(key, payload, ttl_secs.max(1)).await
    }
    .await;

    if let Err(e) = result {
        warn!("Cache write for {key} failed: {e}");
    }
}

pub async fn invalidate(client: &redis::Client, key: &str) {
    let result: redis::RedisResult<()> = async {
        let mut conn = client.get_multiplexed_async_connection().await?;
        conn.del(key).await
    }
    .await;

    if let Err(e) = result {
        warn!("Cache invalidation for {key} failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_distinguishes_tenant_and_system() {
        let tenant = Uuid::nil();
        assert_eq!(
            active_config_key(Some(tenant), ConfigType::Sjt),
            "assessor:config:active:00000000-0000-0000-0000-000000000000:sjt"
        );
        assert_eq!(
            active_config_key(None, ConfigType::Jdt),
            "assessor:config:active:system:jdt"
        );
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_a_miss() {
        // Nothing listens on port 1; the connection error must be swallowed.
        let client = redis::Client::open("redis://127.0.0.1:1/").unwrap();
        let cached: Option<serde_json::Value> = get_json(&client, "missing").await;
        assert!(cached.is_none());
        set_json(&client, "missing", &serde_json::json!({"a": 1}), 30).await;
        invalidate(&client, "missing").await;
    }
}
