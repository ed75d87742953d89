//! Attempt availability and start-up.
//!
//! An attempt freezes everything needed to score it: the selected questions
//! go into `questions_snapshot`, the effective settings into
//! `attempt_metadata`. Nothing downstream re-reads the live configuration.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::assignments::store::{find_assignment, record_progress};
use crate::attempts::selection::{select_jdt_questions, select_sjt_scenarios};
use crate::attempts::store::{count_attempts, find_in_progress, insert_attempt, NewAttempt};
use crate::configurations::store::get_active_configuration;
use crate::configurations::validation::{parse_jdt, parse_sjt};
use crate::errors::AppError;
use crate::models::assignment::{TestAssignmentRow, ASSIGNMENT_ASSIGNED, ASSIGNMENT_STARTED};
use crate::models::configuration::{
    ConfigurationRow, Scenario, ScoringRules, ServedJdtQuestion, TestType, DEFAULT_MAX_ATTEMPTS,
};
use crate::models::records::{AttemptMetadata, TestAttemptRow, STATUS_COMPLETED};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub test_type: TestType,
    pub configured: bool,
    /// Whether an admin assigned this test type to the user.
    pub assigned: bool,
    pub assignment_status: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    /// Completed attempts only.
    pub attempts_used: i64,
    pub max_attempts: u32,
    pub in_progress_attempt_id: Option<Uuid>,
    pub can_start: bool,
}

impl Availability {
    /// An assignment overrides the configured attempt limit and closes the
    /// test once cancelled or past due. Unassigned users get the config limit.
    fn new(
        test_type: TestType,
        configured: bool,
        attempts_used: i64,
        configured_max: u32,
        in_progress_attempt_id: Option<Uuid>,
        assignment: Option<&TestAssignmentRow>,
        now: DateTime<Utc>,
    ) -> Self {
        let max_attempts = assignment.map_or(configured_max, |a| a.attempt_limit());
        let assignment_open = assignment.map_or(true, |a| a.is_open(now));
        let can_start = configured
            && assignment_open
            && attempts_used < i64::from(max_attempts)
            && in_progress_attempt_id.is_none();
        Self {
            test_type,
            configured,
            assigned: assignment.is_some(),
            assignment_status: assignment.map(|a| a.status.clone()),
            due_date: assignment.and_then(|a| a.due_date),
            attempts_used,
            max_attempts,
            in_progress_attempt_id,
            can_start,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StartAttempt {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub test_type: TestType,
    #[serde(default)]
    pub role_category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartedAttempt {
    pub attempt: TestAttemptRow,
    pub questions: serde_json::Value,
    pub remaining_attempts: u32,
}

/// Questions and settings chosen for a new attempt, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptPlan {
    pub questions: serde_json::Value,
    pub question_count: usize,
    pub metadata: AttemptMetadata,
}

pub async fn check_availability(
    state: &AppState,
    user_id: Uuid,
    tenant_id: Option<Uuid>,
    test_type: TestType,
) -> Result<(Availability, Option<ConfigurationRow>), AppError> {
    let config = get_active_configuration(
        &state.db,
        &state.redis,
        state.config.config_cache_ttl_secs,
        tenant_id,
        test_type.config_type(),
    )
    .await?;

    let max_attempts = match &config {
        Some(row) => configured_max_attempts(test_type, row)?,
        None => DEFAULT_MAX_ATTEMPTS,
    };
    let attempts_used = count_attempts(&state.db, user_id, test_type, Some(STATUS_COMPLETED)).await?;
    let in_progress = find_in_progress(&state.db, user_id, test_type).await?;
    let assignment = find_assignment(&state.db, user_id, test_type).await?;

    let availability = Availability::new(
        test_type,
        config.is_some(),
        attempts_used,
        max_attempts,
        in_progress.map(|a| a.id),
        assignment.as_ref(),
        Utc::now(),
    );

    info!(
        "Availability user={user_id} test={} configured={} assigned={} used={}/{} can_start={}",
        test_type.as_str(),
        availability.configured,
        availability.assigned,
        availability.attempts_used,
        availability.max_attempts,
        availability.can_start
    );
    Ok((availability, config))
}

pub async fn start_attempt(state: &AppState, req: &StartAttempt) -> Result<StartedAttempt, AppError> {
    let (availability, config) =
        check_availability(state, req.user_id, req.tenant_id, req.test_type).await?;
    if !availability.can_start {
        return Err(AppError::Forbidden(format!(
            "Cannot start a new {} attempt",
            req.test_type.as_str()
        )));
    }
    let config = config.ok_or_else(|| {
        AppError::NotFound(format!("No active {} configuration", req.test_type.as_str()))
    })?;

    let plan = plan_attempt(
        req.test_type,
        &config,
        req.role_category.as_deref(),
        state.config.scoring_defaults(),
    )?;
    let metadata = serde_json::to_value(&plan.metadata).context("serialize attempt metadata")?;

    let previous = count_attempts(&state.db, req.user_id, req.test_type, None).await?;
    let attempt_number = i32::try_from(previous + 1).context("attempt number overflow")?;

    let attempt = insert_attempt(
        &state.db,
        NewAttempt {
            user_id: req.user_id,
            tenant_id: req.tenant_id,
            test_type: req.test_type,
            attempt_number,
            questions_snapshot: &plan.questions,
            attempt_metadata: &metadata,
            max_questions: i32::try_from(plan.question_count).unwrap_or(i32::MAX),
        },
    )
    .await?;

    if availability.assignment_status.as_deref() == Some(ASSIGNMENT_ASSIGNED) {
        record_progress(&state.db, req.user_id, req.test_type, ASSIGNMENT_STARTED).await?;
    }

    let remaining_attempts = availability
        .max_attempts
        .saturating_sub(u32::try_from(availability.attempts_used + 1).unwrap_or(u32::MAX));

    Ok(StartedAttempt {
        attempt,
        questions: plan.questions,
        remaining_attempts,
    })
}

/// Selects questions and resolves settings from an active configuration.
pub fn plan_attempt(
    test_type: TestType,
    config: &ConfigurationRow,
    role_category: Option<&str>,
    scoring_defaults: ScoringRules,
) -> Result<AttemptPlan, AppError> {
    match test_type {
        TestType::Sjt => {
            let sjt = parse_sjt(&config.config_data)?;
            let scenarios =
                select_sjt_scenarios(&sjt.scenarios, sjt.settings.number_of_questions);
            Ok(AttemptPlan {
                question_count: scenarios.len(),
                questions: serde_json::to_value(&scenarios).context("serialize scenarios")?,
                metadata: AttemptMetadata {
                    config_id: config.id,
                    config_version: config.version,
                    role_category: None,
                    scoring: sjt.settings.scoring_rules(scoring_defaults),
                    time_limit: sjt.settings.time_limit,
                    instructions: sjt.settings.instructions.clone(),
                    job_description: None,
                    answers_count: None,
                },
            })
        }
        TestType::Jdt => {
            let jdt = parse_jdt(&config.config_data)?;
            let selection = select_jdt_questions(&jdt, role_category);
            Ok(AttemptPlan {
                question_count: selection.questions.len(),
                questions: serde_json::to_value(&selection.questions)
                    .context("serialize questions")?,
                metadata: AttemptMetadata {
                    config_id: config.id,
                    config_version: config.version,
                    role_category: selection.role_name,
                    scoring: ScoringRules::without_follow_ups(),
                    time_limit: jdt.settings.time_limit,
                    instructions: jdt.settings.instructions.clone(),
                    job_description: selection.job_description,
                    answers_count: None,
                },
            })
        }
    }
}

fn configured_max_attempts(test_type: TestType, config: &ConfigurationRow) -> Result<u32, AppError> {
    let configured = match test_type {
        TestType::Sjt => parse_sjt(&config.config_data)?.settings.max_attempts,
        TestType::Jdt => parse_jdt(&config.config_data)?.settings.max_attempts,
    };
    Ok(configured.unwrap_or(DEFAULT_MAX_ATTEMPTS))
}

/// Scenarios frozen into an SJT attempt.
pub fn snapshot_scenarios(attempt: &TestAttemptRow) -> Result<Vec<Scenario>, AppError> {
    serde_json::from_value(attempt.questions_snapshot.clone())
        .with_context(|| format!("attempt {} has an unreadable scenario snapshot", attempt.id))
        .map_err(AppError::from)
}

/// Questions frozen into a JDT attempt.
pub fn snapshot_jdt_questions(attempt: &TestAttemptRow) -> Result<Vec<ServedJdtQuestion>, AppError> {
    serde_json::from_value(attempt.questions_snapshot.clone())
        .with_context(|| format!("attempt {} has an unreadable question snapshot", attempt.id))
        .map_err(AppError::from)
}

pub fn attempt_metadata(attempt: &TestAttemptRow) -> Result<AttemptMetadata, AppError> {
    attempt
        .metadata()
        .with_context(|| format!("attempt {} has unreadable metadata", attempt.id))
        .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_row(config_data: serde_json::Value) -> ConfigurationRow {
        ConfigurationRow {
            id: Uuid::new_v4(),
            tenant_id: Some(Uuid::new_v4()),
            config_type: "sjt".to_string(),
            scope: "tenant".to_string(),
            config_data,
            version: 4,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn availability(
        configured: bool,
        used: i64,
        in_progress: Option<Uuid>,
        assignment: Option<&TestAssignmentRow>,
    ) -> Availability {
        Availability::new(TestType::Sjt, configured, used, 3, in_progress, assignment, Utc::now())
    }

    #[test]
    fn test_can_start_requires_config_budget_and_no_open_attempt() {
        assert!(availability(true, 2, None, None).can_start);
        assert!(!availability(false, 0, None, None).can_start);
        assert!(!availability(true, 3, None, None).can_start);
        assert!(!availability(true, 0, Some(Uuid::nil()), None).can_start);
    }

    #[test]
    fn test_assignment_overrides_limit_and_due_date_closes() {
        use crate::models::assignment::tests::assignment;
        use crate::models::assignment::ASSIGNMENT_CANCELLED;

        let generous = assignment(ASSIGNMENT_ASSIGNED, Some(24), 5);
        let result = availability(true, 3, None, Some(&generous));
        assert!(result.assigned);
        assert_eq!(result.max_attempts, 5);
        assert_eq!(result.assignment_status.as_deref(), Some(ASSIGNMENT_ASSIGNED));
        assert!(result.can_start);

        let single = assignment(ASSIGNMENT_STARTED, None, 1);
        assert!(!availability(true, 1, None, Some(&single)).can_start);

        let overdue = assignment(ASSIGNMENT_ASSIGNED, Some(-2), 3);
        assert!(!availability(true, 0, None, Some(&overdue)).can_start);

        let cancelled = assignment(ASSIGNMENT_CANCELLED, None, 3);
        assert!(!availability(true, 0, None, Some(&cancelled)).can_start);

        let unassigned = availability(true, 0, None, None);
        assert!(!unassigned.assigned);
        assert!(unassigned.assignment_status.is_none());
    }

    #[test]
    fn test_sjt_plan_freezes_scoring_rules() {
        let row = config_row(json!({
            "scenarios": [
                {"id": "s2", "situation": "b"},
                {"id": "s1", "situation": "a"},
                {"id": "s3", "situation": "c"}
            ],
            "settings": {"numberOfQuestions": 2, "followUpPenaltyPercent": 15, "timeLimit": 20}
        }));
        let plan = plan_attempt(TestType::Sjt, &row, None, ScoringRules::default()).unwrap();

        assert_eq!(plan.question_count, 2);
        assert_eq!(plan.questions[0]["id"], "s1");
        assert_eq!(plan.questions[1]["id"], "s2");
        assert_eq!(plan.metadata.config_version, 4);
        assert_eq!(plan.metadata.scoring.max_follow_ups, 2);
        assert_eq!(plan.metadata.scoring.follow_up_penalty_percent, 15.0);
        assert_eq!(plan.metadata.time_limit, Some(20));
    }

    #[test]
    fn test_jdt_plan_records_role_and_job_description() {
        let mut row = config_row(json!({
            "roles": [{
                "roleName": "Engineer",
                "jobDescription": "Ship reliable services.",
                "questions": [{"text": "Describe an outage you handled.", "competency": "Ownership"}]
            }],
            "settings": {"aiQuestions": 1}
        }));
        row.config_type = "jdt".to_string();
        let plan = plan_attempt(TestType::Jdt, &row, Some("Engineer"), ScoringRules::default())
            .unwrap();

        assert_eq!(plan.question_count, 2);
        assert_eq!(plan.metadata.role_category.as_deref(), Some("Engineer"));
        assert_eq!(
            plan.metadata.job_description.as_deref(),
            Some("Ship reliable services.")
        );
        assert_eq!(plan.metadata.scoring, ScoringRules::without_follow_ups());
    }

    #[test]
    fn test_plan_rejects_malformed_config() {
        let row = config_row(json!({"scenarios": 42}));
        assert!(matches!(
            plan_attempt(TestType::Sjt, &row, None, ScoringRules::default()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_configured_max_attempts_defaults_to_three() {
        let row = config_row(json!({"scenarios": [{"id": "s1", "situation": "a"}]}));
        assert_eq!(configured_max_attempts(TestType::Sjt, &row).unwrap(), 3);
        let row = config_row(json!({
            "scenarios": [{"id": "s1", "situation": "a"}],
            "settings": {"maxAttempts": 1}
        }));
        assert_eq!(configured_max_attempts(TestType::Sjt, &row).unwrap(), 1);
    }
}
