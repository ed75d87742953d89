mod assignments;
mod attempts;
mod cache;
mod competencies;
mod config;
mod configurations;
mod db;
mod errors;
mod evaluation;
mod llm_client;
mod models;
mod routes;
mod state;
mod submissions;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::evaluation::evaluator::LlmAssessmentEvaluator;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Assessor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Initialize Redis (active-configuration cache)
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!(
        "Redis client initialized (config cache TTL {}s)",
        config.config_cache_ttl_secs
    );

    // Initialize LLM client and the evaluator wrapping it
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let evaluator = Arc::new(LlmAssessmentEvaluator(llm));

    info!(
        "Scoring defaults: {} follow-up(s), {}% penalty per follow-up",
        config.default_max_follow_ups, config.default_follow_up_penalty_percent
    );

    // Build app state
    let state = AppState {
        db,
        redis,
        config: config.clone(),
        evaluator,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the admin UI host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
