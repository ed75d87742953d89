//! Post-submission analysis.
//!
//! Flow: atomically claim the submission (`analyzing`) → score/backfill +
//! aggregate → annotate with the competency dictionary → persist report and
//! annotated conversation with status `completed`. Any failure after the
//! claim leaves the submission `failed` so it can be retried.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::attempts::lifecycle::{attempt_metadata, snapshot_jdt_questions, snapshot_scenarios};
use crate::attempts::store::get_attempt;
use crate::competencies::store::load_catalog;
use crate::errors::AppError;
use crate::evaluation::aggregation::{CompetencyReport, RatingBand};
use crate::evaluation::analysis::{analyze_jdt, analyze_sjt, JdtContext};
use crate::models::configuration::{Scenario, ScoringRules, ServedJdtQuestion, TestType};
use crate::models::conversation::{ConversationEntry, MAX_SCORE, MIN_SCORE};
use crate::models::records::SubmissionRow;
use crate::state::AppState;
use crate::submissions::store::{
    claim_for_analysis, get_submission, mark_failed, save_analysis, QuestionCounts,
};

/// Stored in `submissions.analysis_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub test_type: TestType,
    pub report: CompetencyReport,
    pub analyzed_at: DateTime<Utc>,
}

/// One row of the reports listing.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub submission_id: Uuid,
    pub user_id: Uuid,
    pub candidate_name: String,
    pub test_type: TestType,
    pub overall_pre_penalty_score: Option<f64>,
    pub overall_post_penalty_score: Option<f64>,
    pub overall_rating: Option<RatingBand>,
    pub total_follow_ups: u32,
    pub analyzed_at: DateTime<Utc>,
}

impl ReportSummary {
    pub fn from_row(row: &SubmissionRow) -> Option<Self> {
        let analysis: AnalysisResult = serde_json::from_value(row.analysis_result.clone()?).ok()?;
        Some(Self {
            submission_id: row.id,
            user_id: row.user_id,
            candidate_name: row.candidate_name.clone(),
            test_type: analysis.test_type,
            overall_pre_penalty_score: analysis.report.overall_pre_penalty_score,
            overall_post_penalty_score: analysis.report.overall_post_penalty_score,
            overall_rating: analysis.report.overall_rating,
            total_follow_ups: analysis.report.total_follow_ups,
            analyzed_at: analysis.analyzed_at,
        })
    }
}

pub fn count_questions(entries: &[ConversationEntry]) -> QuestionCounts {
    let follow_up = entries.iter().filter(|e| e.is_follow_up).count();
    let total = entries.len();
    QuestionCounts {
        total: total as i32,
        base: (total - follow_up) as i32,
        follow_up: follow_up as i32,
    }
}

/// Rejects client-supplied evaluations with scores off the 1-5 scale.
pub fn check_scores(entries: &[ConversationEntry]) -> Result<(), AppError> {
    for (index, entry) in entries.iter().enumerate() {
        if let Some(evaluation) = &entry.evaluation {
            if !(MIN_SCORE..=MAX_SCORE).contains(&evaluation.score) {
                return Err(AppError::Validation(format!(
                    "conversation_history[{index}] has score {}; scores must be between {MIN_SCORE} and {MAX_SCORE}",
                    evaluation.score
                )));
            }
        }
    }
    Ok(())
}

pub fn parse_conversation(row: &SubmissionRow) -> Result<Vec<ConversationEntry>, AppError> {
    serde_json::from_value(row.conversation_history.clone())
        .with_context(|| format!("submission {} has an unreadable conversation", row.id))
        .map_err(AppError::from)
}

pub async fn analyze_submission(state: &AppState, id: Uuid) -> Result<SubmissionRow, AppError> {
    let Some(row) = claim_for_analysis(&state.db, id).await? else {
        // Nothing claimed: either the submission is missing or another run holds it.
        get_submission(&state.db, id).await?;
        return Err(AppError::Conflict(format!(
            "Submission {id} is already being analyzed"
        )));
    };
    info!("Analyzing {} submission {id}", row.test_type);

    match run_analysis(state, &row).await {
        Ok(updated) => Ok(updated),
        Err(e) => {
            error!("Analysis of submission {id} failed: {e}");
            if let Err(mark_err) = mark_failed(&state.db, id).await {
                error!("Could not mark submission {id} failed: {mark_err}");
            }
            Err(e)
        }
    }
}

async fn run_analysis(state: &AppState, row: &SubmissionRow) -> Result<SubmissionRow, AppError> {
    let test_type = TestType::parse(&row.test_type).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "submission {} has unknown test type '{}'",
            row.id,
            row.test_type
        ))
    })?;
    let entries = parse_conversation(row)?;
    let evaluator = state.evaluator.as_ref();
    let catalog = load_catalog(&state.db, row.tenant_id).await?;

    let aggregation = match test_type {
        TestType::Sjt => {
            let (scenarios, rules) = sjt_context(state, row.attempt_id).await?;
            analyze_sjt(evaluator, entries, &scenarios, &rules, &catalog).await
        }
        TestType::Jdt => {
            let (job_description, served) = jdt_context(state, row.attempt_id).await?;
            let context = JdtContext {
                job_description: job_description.as_deref(),
                served: &served,
                catalog: &catalog,
            };
            analyze_jdt(evaluator, entries, &context).await
        }
    };

    let analysis = AnalysisResult {
        test_type,
        report: aggregation.report,
        analyzed_at: Utc::now(),
    };
    let analysis_value = serde_json::to_value(&analysis).context("serialize analysis result")?;
    let conversation_value =
        serde_json::to_value(&aggregation.entries).context("serialize conversation")?;

    save_analysis(&state.db, row.id, &analysis_value, &conversation_value).await
}

/// Scenarios and penalty settings from the attempt snapshot, or service
/// defaults for submissions made without an attempt.
async fn sjt_context(
    state: &AppState,
    attempt_id: Option<Uuid>,
) -> Result<(Vec<Scenario>, ScoringRules), AppError> {
    match attempt_id {
        Some(attempt_id) => {
            let attempt = get_attempt(&state.db, attempt_id).await?;
            Ok((snapshot_scenarios(&attempt)?, attempt_metadata(&attempt)?.scoring))
        }
        None => Ok((Vec::new(), state.config.scoring_defaults())),
    }
}

/// Job description and served questions from the attempt snapshot.
async fn jdt_context(
    state: &AppState,
    attempt_id: Option<Uuid>,
) -> Result<(Option<String>, Vec<ServedJdtQuestion>), AppError> {
    match attempt_id {
        Some(attempt_id) => {
            let attempt = get_attempt(&state.db, attempt_id).await?;
            Ok((
                attempt_metadata(&attempt)?.job_description,
                snapshot_jdt_questions(&attempt)?,
            ))
        }
        None => Ok((None, Vec::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(is_follow_up: bool) -> ConversationEntry {
        ConversationEntry {
            scenario_id: Some("s1".to_string()),
            question: "q".to_string(),
            answer: "a".to_string(),
            is_follow_up,
            follow_up_sequence: u32::from(is_follow_up),
            ..Default::default()
        }
    }

    fn submission(analysis_result: Option<serde_json::Value>) -> SubmissionRow {
        SubmissionRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            tenant_id: None,
            attempt_id: None,
            test_type: "SJT".to_string(),
            candidate_name: "Ada Lovelace".to_string(),
            conversation_history: json!([]),
            analysis_result,
            total_questions: 0,
            base_questions: 0,
            follow_up_questions: 0,
            status: "completed".to_string(),
            analysis_completed: true,
            analysis_completed_at: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_count_questions_splits_base_and_follow_ups() {
        let counts = count_questions(&[entry(false), entry(true), entry(false)]);
        assert_eq!(
            counts,
            QuestionCounts {
                total: 3,
                base: 2,
                follow_up: 1
            }
        );
    }

    #[test]
    fn test_report_summary_reads_stored_analysis() {
        let report = crate::evaluation::aggregation::aggregate(vec![], &ScoringRules::default()).report;
        let analysis = AnalysisResult {
            test_type: TestType::Sjt,
            report,
            analyzed_at: Utc::now(),
        };
        let row = submission(Some(serde_json::to_value(&analysis).unwrap()));

        let summary = ReportSummary::from_row(&row).unwrap();
        assert_eq!(summary.candidate_name, "Ada Lovelace");
        assert_eq!(summary.test_type, TestType::Sjt);
        assert!(summary.overall_post_penalty_score.is_none());
    }

    #[test]
    fn test_report_summary_skips_missing_or_garbled_analysis() {
        assert!(ReportSummary::from_row(&submission(None)).is_none());
        assert!(ReportSummary::from_row(&submission(Some(json!({"oops": true})))).is_none());
    }

    #[test]
    fn test_check_scores_rejects_off_scale_evaluations() {
        let mut entries: Vec<ConversationEntry> = serde_json::from_value(json!([
            {"question": "q1", "answer": "a", "evaluation": {"score": 5, "is_complete": true}},
            {"question": "q2", "answer": "a"}
        ]))
        .unwrap();
        assert!(check_scores(&entries).is_ok());

        entries[1].evaluation = entries[0].evaluation.clone();
        entries[1].evaluation.as_mut().unwrap().score = 0;
        let err = check_scores(&entries).unwrap_err();
        assert!(err.to_string().contains("conversation_history[1] has score 0"));

        entries[1].evaluation.as_mut().unwrap().score = 9;
        assert!(matches!(check_scores(&entries), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_parse_conversation_rejects_non_list() {
        let mut row = submission(None);
        row.conversation_history = json!({"not": "a list"});
        assert!(matches!(parse_conversation(&row), Err(AppError::Internal(_))));
    }
}
