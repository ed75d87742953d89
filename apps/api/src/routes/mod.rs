pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::assignments::handlers as assignments;
use crate::attempts::handlers as attempts;
use crate::competencies::handlers as competencies;
use crate::configurations::handlers as configurations;
use crate::evaluation::handlers as evaluation;
use crate::state::AppState;
use crate::submissions::handlers as submissions;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Configuration API
        .route(
            "/api/v1/configurations",
            post(configurations::handle_create_configuration)
                .get(configurations::handle_list_configurations),
        )
        .route(
            "/api/v1/configurations/active/:config_type",
            get(configurations::handle_get_active_configuration),
        )
        .route(
            "/api/v1/configurations/:id",
            get(configurations::handle_get_configuration)
                .put(configurations::handle_update_configuration)
                .delete(configurations::handle_deactivate_configuration),
        )
        // Competency dictionary
        .route(
            "/api/v1/competencies",
            post(competencies::handle_create_competency)
                .get(competencies::handle_list_competencies),
        )
        .route(
            "/api/v1/competencies/:code",
            get(competencies::handle_get_competency)
                .put(competencies::handle_update_competency)
                .delete(competencies::handle_delete_competency),
        )
        // Assignment API
        .route(
            "/api/v1/assignments",
            post(assignments::handle_create_assignment)
                .get(assignments::handle_list_assignments),
        )
        .route(
            "/api/v1/assignments/:id",
            put(assignments::handle_update_assignment)
                .delete(assignments::handle_delete_assignment),
        )
        // Attempt API
        .route(
            "/api/v1/attempts/availability",
            get(attempts::handle_availability),
        )
        .route("/api/v1/attempts/start", post(attempts::handle_start_attempt))
        .route("/api/v1/attempts", get(attempts::handle_list_attempts))
        .route("/api/v1/attempts/:id", get(attempts::handle_get_attempt))
        .route(
            "/api/v1/attempts/:id/complete",
            post(attempts::handle_complete_attempt),
        )
        // Evaluation API
        .route("/api/v1/evaluations/sjt", post(evaluation::handle_evaluate_sjt))
        .route("/api/v1/evaluations/jdt", post(evaluation::handle_evaluate_jdt))
        // Submission API
        .route(
            "/api/v1/submissions",
            post(submissions::handle_create_submission).get(submissions::handle_list_submissions),
        )
        .route(
            "/api/v1/submissions/users/:user_id/:test_type/latest",
            get(submissions::handle_latest_submission),
        )
        .route(
            "/api/v1/submissions/users/:user_id/:test_type/count",
            get(submissions::handle_count_submissions),
        )
        .route("/api/v1/submissions/:id", get(submissions::handle_get_submission))
        .route(
            "/api/v1/submissions/:id/analyze",
            post(submissions::handle_analyze_submission),
        )
        .route("/api/v1/reports", get(submissions::handle_list_reports))
        .with_state(state)
}
