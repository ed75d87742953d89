use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::db;
use crate::state::AppState;

/// GET /health
/// Reports service version and whether PostgreSQL answers.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let database = db::ping(&state.db).await;
    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
        "service": "assessor"
    }))
}
