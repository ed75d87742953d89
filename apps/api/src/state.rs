use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::config::Config;
use crate::evaluation::evaluator::AssessmentEvaluator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Active-configuration cache.
    pub redis: RedisClient,
    pub config: Config,
    /// Pluggable answer evaluator. Default: LlmAssessmentEvaluator.
    pub evaluator: Arc<dyn AssessmentEvaluator>,
}
