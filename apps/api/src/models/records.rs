use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::configuration::ScoringRules;

pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";

pub const SUBMISSION_SUBMITTED: &str = "submitted";
pub const SUBMISSION_ANALYZING: &str = "analyzing";
pub const SUBMISSION_COMPLETED: &str = "completed";
pub const SUBMISSION_FAILED: &str = "failed";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestAttemptRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub test_type: String,
    pub attempt_number: i32,
    pub status: String,
    pub max_questions: i32,
    /// Scenarios (SJT) or served questions (JDT), immutable once started.
    pub questions_snapshot: Value,
    pub attempt_metadata: Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubmissionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub attempt_id: Option<Uuid>,
    pub test_type: String,
    pub candidate_name: String,
    pub conversation_history: Value,
    pub analysis_result: Option<Value>,
    pub total_questions: i32,
    pub base_questions: i32,
    pub follow_up_questions: i32,
    pub status: String,
    pub analysis_completed: bool,
    pub analysis_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Settings frozen into `test_attempts.attempt_metadata` when an attempt starts,
/// so later config edits never change how a running attempt is scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptMetadata {
    pub config_id: Uuid,
    pub config_version: i32,
    #[serde(default)]
    pub role_category: Option<String>,
    #[serde(default)]
    pub scoring: ScoringRules,
    #[serde(default)]
    pub time_limit: Option<u32>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    /// Written by `complete_attempt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers_count: Option<u32>,
}

impl TestAttemptRow {
    pub fn metadata(&self) -> Result<AttemptMetadata, serde_json::Error> {
        serde_json::from_value(self.attempt_metadata.clone())
    }
}
