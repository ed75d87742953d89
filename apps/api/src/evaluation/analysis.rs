//! Interview-time and post-hoc evaluation pipelines.
//!
//! `evaluate_sjt_turn` runs one live SJT answer through the evaluator, the
//! follow-up policy and the labeler. `analyze_sjt` / `analyze_jdt` score a
//! finished conversation and roll it up into a `CompetencyReport`.

use serde::Serialize;
use tracing::info;

use crate::evaluation::aggregation::{
    aggregate, annotate_competencies, group_by_scenario, Aggregation, CompetencyReport,
};
use crate::evaluation::evaluator::{
    evaluate_jdt_with_fallback, evaluate_sjt_with_fallback, fallback_summary,
    summarize_with_fallback, AssessmentEvaluator, Exchange, JdtEvaluationRequest,
    SjtEvaluationRequest,
};
use crate::evaluation::policy::{apply_follow_up_policy, label_follow_up};
use crate::models::competency::CompetencyRow;
use crate::models::configuration::{Scenario, ScoringRules, ServedJdtQuestion};
use crate::models::conversation::{ConversationEntry, EvaluationResult, FollowUpPrompt};

// ────────────────────────────────────────────────────────────────────────────
// Live SJT turn
// ────────────────────────────────────────────────────────────────────────────

pub struct SjtTurnInput<'a> {
    pub scenario: &'a Scenario,
    /// The question being answered; the scenario question for the base turn.
    pub question: &'a str,
    pub answer: &'a str,
    pub previous_exchanges: &'a [Exchange],
    /// Follow-ups already asked on this scenario.
    pub follow_up_count: u32,
    pub rules: ScoringRules,
}

#[derive(Debug, Clone, Serialize)]
pub struct SjtTurn {
    pub evaluation: EvaluationResult,
    pub follow_up: Option<FollowUpPrompt>,
    /// Follow-ups still available after the one returned here (if any).
    pub follow_ups_remaining: u32,
    /// Ready to append to the client's conversation history.
    pub entry: ConversationEntry,
}

pub async fn evaluate_sjt_turn(
    evaluator: &dyn AssessmentEvaluator,
    input: SjtTurnInput<'_>,
) -> SjtTurn {
    let max_follow_ups = input.rules.max_follow_ups;
    let request = SjtEvaluationRequest {
        scenario: input.scenario,
        question: input.question,
        answer: input.answer,
        previous_exchanges: input.previous_exchanges,
        follow_up_count: input.follow_up_count,
        max_follow_ups,
    };

    let raw = evaluate_sjt_with_fallback(evaluator, &request).await;
    let evaluation = apply_follow_up_policy(raw, input.follow_up_count, max_follow_ups);

    let follow_up = evaluation
        .follow_up_question
        .as_deref()
        .map(|q| label_follow_up(q, input.follow_up_count + 1, max_follow_ups));

    let asked = input.follow_up_count + u32::from(follow_up.is_some());
    let follow_ups_remaining = max_follow_ups.saturating_sub(asked);

    let entry = ConversationEntry {
        scenario_id: Some(input.scenario.id.clone()),
        question: input.question.to_string(),
        answer: input.answer.to_string(),
        competency: input.scenario.competency.clone(),
        is_follow_up: input.follow_up_count > 0,
        follow_up_sequence: input.follow_up_count,
        follow_up_question: follow_up.as_ref().map(|f| f.question.clone()),
        evaluation: Some(evaluation.clone()),
        ..Default::default()
    };

    SjtTurn {
        evaluation,
        follow_up,
        follow_ups_remaining,
        entry,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Post-hoc analysis
// ────────────────────────────────────────────────────────────────────────────

/// Scores an SJT conversation and aggregates it.
///
/// Scenario groups whose last entry was never evaluated (the candidate
/// submitted before the live call returned) are evaluated now with the
/// follow-up budget treated as exhausted, so no new follow-up is requested.
pub async fn analyze_sjt(
    evaluator: &dyn AssessmentEvaluator,
    mut entries: Vec<ConversationEntry>,
    scenarios: &[Scenario],
    rules: &ScoringRules,
    catalog: &[CompetencyRow],
) -> Aggregation {
    let mut backfilled = 0usize;

    for group in group_by_scenario(&entries) {
        let last = group.last_index();
        if entries[last].evaluation.is_some() {
            continue;
        }

        let base = group.base_index(&entries);
        let scenario = scenarios
            .iter()
            .find(|s| s.id == group.key)
            .cloned()
            .unwrap_or_else(|| scenario_from_entry(&group.key, &entries[base]));

        let previous: Vec<Exchange> = group
            .indices
            .iter()
            .filter(|&&i| i != last)
            .map(|&i| Exchange {
                question: entries[i].question.clone(),
                answer: entries[i].answer.clone(),
            })
            .collect();
        let follow_up_count = group.follow_up_count(&entries);

        let request = SjtEvaluationRequest {
            scenario: &scenario,
            question: &entries[last].question,
            answer: &entries[last].answer,
            previous_exchanges: &previous,
            follow_up_count,
            max_follow_ups: follow_up_count,
        };
        let raw = evaluate_sjt_with_fallback(evaluator, &request).await;
        let evaluation = apply_follow_up_policy(raw, follow_up_count, follow_up_count);

        entries[last].evaluation = Some(evaluation);
        backfilled += 1;
    }

    if backfilled > 0 {
        info!("Backfilled {backfilled} unevaluated SJT scenario(s) before aggregation");
    }

    let mut aggregation = aggregate(entries, rules);
    annotate_competencies(&mut aggregation.report, catalog);
    summarize_competencies(evaluator, &mut aggregation.report).await;
    aggregation
}

/// Inputs a JDT analysis draws from the attempt, when there is one.
#[derive(Debug, Default)]
pub struct JdtContext<'a> {
    pub job_description: Option<&'a str>,
    /// Questions frozen into the attempt at start.
    pub served: &'a [ServedJdtQuestion],
    pub catalog: &'a [CompetencyRow],
}

/// Scores every JDT answer and aggregates with no follow-up penalty.
///
/// Each question is its own group; entries without an id get `q{n}` (1-based).
/// Rubric and competency missing from an entry are taken from the attempt's
/// served questions before scoring.
pub async fn analyze_jdt(
    evaluator: &dyn AssessmentEvaluator,
    mut entries: Vec<ConversationEntry>,
    context: &JdtContext<'_>,
) -> Aggregation {
    fill_from_served(&mut entries, context.served);
    let job_description = context.job_description;

    for (index, entry) in entries.iter_mut().enumerate() {
        if entry
            .scenario_id
            .as_deref()
            .map_or(true, |id| id.trim().is_empty())
        {
            entry.scenario_id = Some(format!("q{}", index + 1));
        }
        if entry.evaluation.is_some() {
            continue;
        }

        let request = JdtEvaluationRequest {
            question: &entry.question,
            preferred_answer: entry.preferred_answer.as_deref(),
            competency: entry.competency.as_deref(),
            job_description,
            answer: &entry.answer,
        };
        entry.evaluation = Some(evaluate_jdt_with_fallback(evaluator, &request).await);
    }

    let mut aggregation = aggregate(entries, &ScoringRules::without_follow_ups());
    annotate_competencies(&mut aggregation.report, context.catalog);
    summarize_competencies(evaluator, &mut aggregation.report).await;
    aggregation
}

/// Matches entries to served questions by text, else by position, and fills
/// `preferred_answer` and `competency` where the client left them out.
pub fn fill_from_served(entries: &mut [ConversationEntry], served: &[ServedJdtQuestion]) {
    if served.is_empty() {
        return;
    }
    for (index, entry) in entries.iter_mut().enumerate() {
        let text = entry.question.trim();
        let Some(question) = served
            .iter()
            .find(|q| q.question.trim() == text)
            .or_else(|| served.get(index))
        else {
            continue;
        };
        if entry.preferred_answer.is_none() {
            entry.preferred_answer = question.preferred_answer.clone();
        }
        if entry.competency.is_none() {
            entry.competency = question.competency.clone();
        }
    }
}

/// Fills each competency's narrative. Unscored competencies get the
/// deterministic sentence without a model call.
pub async fn summarize_competencies(
    evaluator: &dyn AssessmentEvaluator,
    report: &mut CompetencyReport,
) {
    let CompetencyReport {
        competencies,
        scenarios,
        ..
    } = report;

    for competency in competencies.iter_mut() {
        let text = if competency.scored_scenario_count == 0 {
            fallback_summary(competency)
        } else {
            let evidence: Vec<_> = scenarios
                .iter()
                .filter(|s| s.competency == competency.competency)
                .collect();
            summarize_with_fallback(evaluator, competency, &evidence).await
        };
        competency.summary = Some(text);
    }
}

fn scenario_from_entry(key: &str, entry: &ConversationEntry) -> Scenario {
    Scenario {
        id: key.to_string(),
        situation: String::new(),
        question: entry.question.clone(),
        best_response_rationale: String::new(),
        worst_response_rationale: String::new(),
        competency: entry.competency.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::evaluation::evaluator::tests::{llm_result, scenario, StubEvaluator};
    use crate::models::conversation::EvaluationSource;

    fn rules() -> ScoringRules {
        ScoringRules {
            max_follow_ups: 2,
            follow_up_penalty_percent: 10.0,
        }
    }

    fn input<'a>(scenario: &'a Scenario, question: &'a str, follow_up_count: u32) -> SjtTurnInput<'a> {
        SjtTurnInput {
            scenario,
            question,
            answer: "I would raise it with my manager.",
            previous_exchanges: &[],
            follow_up_count,
            rules: rules(),
        }
    }

    #[tokio::test]
    async fn test_low_score_turn_returns_labeled_follow_up() {
        let stub = StubEvaluator::with_sjt(vec![Ok(llm_result(
            2,
            false,
            Some("Follow-up 1: What would you say to the colleague?"),
        ))]);
        let scenario = scenario();
        let turn = evaluate_sjt_turn(&stub, input(&scenario, &scenario.question, 0)).await;

        let follow_up = turn.follow_up.expect("follow-up expected");
        assert_eq!(follow_up.question, "What would you say to the colleague?");
        assert_eq!(follow_up.sequence, 1);
        assert_eq!(follow_up.label, "Follow-up 1 of 2");
        assert_eq!(turn.follow_ups_remaining, 1);
        assert!(!turn.entry.is_follow_up);
        assert_eq!(turn.entry.follow_up_sequence, 0);
        assert_eq!(
            turn.entry.follow_up_question.as_deref(),
            Some("What would you say to the colleague?")
        );
        assert_eq!(turn.entry.competency.as_deref(), Some("Communication"));
    }

    #[tokio::test]
    async fn test_budget_exhausted_turn_completes() {
        let stub = StubEvaluator::with_sjt(vec![Ok(llm_result(2, false, Some("Why?")))]);
        let scenario = scenario();
        let turn = evaluate_sjt_turn(&stub, input(&scenario, "And then?", 2)).await;

        assert!(turn.evaluation.is_complete);
        assert!(turn.follow_up.is_none());
        assert_eq!(turn.follow_ups_remaining, 0);
        assert!(turn.entry.is_follow_up);
        assert_eq!(turn.entry.follow_up_sequence, 2);
    }

    #[tokio::test]
    async fn test_llm_failure_turn_never_stalls() {
        let stub = StubEvaluator::with_sjt(vec![Err("503".to_string())]);
        let scenario = scenario();
        let turn = evaluate_sjt_turn(&stub, input(&scenario, &scenario.question, 0)).await;

        assert_eq!(turn.evaluation.score, 3);
        assert!(turn.evaluation.is_complete);
        assert_eq!(turn.evaluation.source, EvaluationSource::Fallback);
        assert!(turn.follow_up.is_none());
    }

    #[tokio::test]
    async fn test_empty_answer_gets_generic_follow_up() {
        let stub = StubEvaluator::default();
        let scenario = scenario();
        let mut turn_input = input(&scenario, &scenario.question, 0);
        turn_input.answer = "  ";
        let turn = evaluate_sjt_turn(&stub, turn_input).await;

        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        assert_eq!(turn.evaluation.score, 1);
        assert_eq!(turn.evaluation.source, EvaluationSource::Rule);
        let follow_up = turn.follow_up.expect("follow-up expected");
        assert_eq!(follow_up.question, crate::evaluation::policy::GENERIC_FOLLOW_UP);
        assert!(!follow_up.question.contains("privately"));
    }

    fn sjt_entry(sequence: u32, evaluation: Option<EvaluationResult>) -> ConversationEntry {
        ConversationEntry {
            scenario_id: Some("scenario1".to_string()),
            question: format!("question {sequence}"),
            answer: "answer".to_string(),
            competency: Some("Communication".to_string()),
            is_follow_up: sequence > 0,
            follow_up_sequence: sequence,
            evaluation,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_analyze_sjt_backfills_only_unevaluated_groups() {
        let stub = StubEvaluator::with_sjt(vec![Ok(llm_result(2, false, Some("More?")))]);
        let entries = vec![
            sjt_entry(0, Some(llm_result(2, false, Some("What next?")))),
            sjt_entry(1, None),
        ];

        let aggregation = analyze_sjt(&stub, entries, &[scenario()], &rules(), &[]).await;

        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        let backfilled = aggregation.entries[1].evaluation.as_ref().unwrap();
        assert!(backfilled.is_complete);
        assert!(backfilled.follow_up_question.is_none());

        let scenario = &aggregation.report.scenarios[0];
        assert_eq!(scenario.pre_penalty_score, Some(2.0));
        assert_eq!(scenario.post_penalty_score, Some(1.8));
        assert_eq!(aggregation.entries[0].post_penalty_score, Some(1.8));
    }

    #[tokio::test]
    async fn test_analyze_sjt_writes_summaries() {
        let stub = StubEvaluator {
            summary: Some("Communicates directly and early.".to_string()),
            ..Default::default()
        };
        let entries = vec![sjt_entry(0, Some(llm_result(5, true, None)))];
        let report = analyze_sjt(&stub, entries, &[scenario()], &rules(), &[])
            .await
            .report;

        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            report.competencies[0].summary.as_deref(),
            Some("Communicates directly and early.")
        );
    }

    #[tokio::test]
    async fn test_analyze_jdt_scores_every_answer_without_penalty() {
        let stub = StubEvaluator::with_jdt(vec![
            Ok(llm_result(4, true, None)),
            Err("timeout".to_string()),
        ]);
        let entries = vec![
            ConversationEntry {
                question: "Describe your Agile experience.".to_string(),
                answer: "Two-week sprints with retros.".to_string(),
                competency: Some("Technical Knowledge".to_string()),
                ..Default::default()
            },
            ConversationEntry {
                question: "How do you handle conflict?".to_string(),
                answer: "I listen first.".to_string(),
                competency: Some("Teamwork".to_string()),
                ..Default::default()
            },
        ];

        let context = JdtContext {
            job_description: Some("Senior engineer"),
            ..Default::default()
        };
        let aggregation = analyze_jdt(&stub, entries, &context).await;
        let report = &aggregation.report;

        assert_eq!(report.scenarios.len(), 2);
        assert_eq!(report.scenarios[0].scenario_id, "q1");
        assert_eq!(report.scenarios[0].post_penalty_score, Some(4.0));
        assert!(report.scenarios[1].used_fallback);
        assert_eq!(report.scenarios[1].post_penalty_score, Some(3.0));
        assert_eq!(report.scoring.follow_up_penalty_percent, 0.0);
        assert_eq!(report.overall_post_penalty_score, Some(3.5));
    }

    fn served(question: &str, rubric: &str, competency: &str) -> ServedJdtQuestion {
        ServedJdtQuestion {
            question: question.to_string(),
            preferred_answer: Some(rubric.to_string()),
            competency: Some(competency.to_string()),
        }
    }

    #[test]
    fn test_fill_from_served_matches_text_then_position() {
        let served = vec![
            served("Why this role?", "Motivation tied to the team", "Motivation"),
            served("Describe an outage.", "Calm triage and follow-up", "Ownership"),
        ];
        let mut entries = vec![
            ConversationEntry {
                question: " Describe an outage. ".to_string(),
                ..Default::default()
            },
            ConversationEntry {
                question: "Why do you want this job?".to_string(),
                competency: Some("Drive".to_string()),
                ..Default::default()
            },
            ConversationEntry {
                question: "Anything else?".to_string(),
                ..Default::default()
            },
        ];
        fill_from_served(&mut entries, &served);

        assert_eq!(entries[0].competency.as_deref(), Some("Ownership"));
        assert_eq!(
            entries[0].preferred_answer.as_deref(),
            Some("Calm triage and follow-up")
        );
        // Position fallback never overrides what the client sent.
        assert_eq!(entries[1].competency.as_deref(), Some("Drive"));
        assert_eq!(
            entries[1].preferred_answer.as_deref(),
            Some("Calm triage and follow-up")
        );
        assert!(entries[2].preferred_answer.is_none());
    }

    #[tokio::test]
    async fn test_analyze_jdt_scores_against_served_rubric() {
        use crate::models::competency::tests::competency;

        let stub = StubEvaluator::with_jdt(vec![Ok(llm_result(4, true, None))]);
        let served = vec![served("Why this role?", "Motivation tied to the team", "MOT")];
        let catalog = vec![competency("MOT", "Motivation", None)];
        let entries = vec![ConversationEntry {
            question: "Why this role?".to_string(),
            answer: "I want to build reliable systems.".to_string(),
            ..Default::default()
        }];
        let context = JdtContext {
            job_description: None,
            served: &served,
            catalog: &catalog,
        };

        let report = analyze_jdt(&stub, entries, &context).await.report;

        assert_eq!(
            stub.jdt_rubrics.lock().unwrap()[0],
            (
                Some("Motivation tied to the team".to_string()),
                Some("MOT".to_string())
            )
        );
        let summary = &report.competencies[0];
        assert_eq!(summary.name.as_deref(), Some("Motivation"));
        assert!(summary.summary.as_deref().unwrap().starts_with("Motivation: Proficient"));
    }
}
