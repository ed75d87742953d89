use anyhow::{Context, Result};

use crate::models::configuration::ScoringRules;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// TTL of the active-configuration cache in Redis.
    pub config_cache_ttl_secs: u64,
    /// Follow-up budget used when an SJT configuration does not set one.
    pub default_max_follow_ups: u32,
    /// Per-follow-up penalty used when an SJT configuration does not set one.
    pub default_follow_up_penalty_percent: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: optional_env("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
            config_cache_ttl_secs: optional_env("CONFIG_CACHE_TTL_SECS", "30")
                .parse::<u64>()
                .context("CONFIG_CACHE_TTL_SECS must be a non-negative integer")?,
            default_max_follow_ups: optional_env("DEFAULT_MAX_FOLLOW_UPS", "2")
                .parse::<u32>()
                .context("DEFAULT_MAX_FOLLOW_UPS must be a non-negative integer")?,
            default_follow_up_penalty_percent: parse_percent(&optional_env(
                "DEFAULT_FOLLOW_UP_PENALTY_PERCENT",
                "10",
            ))?,
        })
    }

    /// Scoring rules applied to SJT configurations that omit them.
    pub fn scoring_defaults(&self) -> ScoringRules {
        ScoringRules {
            max_follow_ups: self.default_max_follow_ups,
            follow_up_penalty_percent: self.default_follow_up_penalty_percent,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_percent(raw: &str) -> Result<f64> {
    let value = raw
        .parse::<f64>()
        .context("DEFAULT_FOLLOW_UP_PENALTY_PERCENT must be a number")?;
    anyhow::ensure!(
        (0.0..=100.0).contains(&value),
        "DEFAULT_FOLLOW_UP_PENALTY_PERCENT must be between 0 and 100, got {value}"
    );
    Ok(value)
}
