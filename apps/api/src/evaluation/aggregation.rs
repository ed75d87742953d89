//! Scenario grouping and competency roll-up.
//!
//! Algorithm:
//! 1. Group conversation entries by `scenario_id` in first-seen order
//!    (entries without one become their own group, keyed `entry-{index}`).
//! 2. Per group: base entry = `follow_up_sequence == 0` (else the first entry),
//!    follow-ups = entries flagged `is_follow_up`, pre-penalty score = score of
//!    the last evaluated entry, post-penalty score via `penalty::apply_penalty`.
//! 3. Annotate each scored group's base entry with its pre/post scores.
//! 4. Roll scored scenarios up per competency (first-seen order) and overall.
//!
//! `annotate_competencies` then attaches dictionary names and definitions.

use serde::{Deserialize, Serialize};

use crate::evaluation::penalty::{apply_penalty, round2};
use crate::models::competency::CompetencyRow;
use crate::models::configuration::ScoringRules;
use crate::models::conversation::{ConversationEntry, EvaluationResult, MAX_SCORE, MIN_SCORE};

pub const UNASSIGNED_COMPETENCY: &str = "Unassigned";

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingBand {
    Exceptional,
    Proficient,
    Developing,
    NeedsImprovement,
}

impl RatingBand {
    /// Bands a post-penalty average on the 1–5 scale.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 4.5 => RatingBand::Exceptional,
            s if s >= 3.5 => RatingBand::Proficient,
            s if s >= 2.5 => RatingBand::Developing,
            _ => RatingBand::NeedsImprovement,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RatingBand::Exceptional => "Exceptional",
            RatingBand::Proficient => "Proficient",
            RatingBand::Developing => "Developing",
            RatingBand::NeedsImprovement => "Needs improvement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_id: String,
    pub competency: String,
    pub question: String,
    pub follow_up_count: u32,
    pub scored: bool,
    pub pre_penalty_score: Option<f64>,
    pub post_penalty_score: Option<f64>,
    pub penalty_applied: f64,
    pub rationale: Option<String>,
    pub missing_aspects: Vec<String>,
    /// True when the final score is a placeholder written after an LLM failure.
    pub used_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencySummary {
    pub competency: String,
    pub scenario_count: usize,
    pub scored_scenario_count: usize,
    pub average_pre_penalty_score: Option<f64>,
    pub average_post_penalty_score: Option<f64>,
    pub total_follow_ups: u32,
    pub rating: Option<RatingBand>,
    /// Narrative written after aggregation; see `analysis::summarize_competencies`.
    pub summary: Option<String>,
    /// Catalog fields, filled by `annotate_competencies` when the label is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_competency: Option<String>,
}

impl CompetencySummary {
    /// Catalog name when known, else the label used in the conversation.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.competency)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyReport {
    pub overall_pre_penalty_score: Option<f64>,
    pub overall_post_penalty_score: Option<f64>,
    pub overall_rating: Option<RatingBand>,
    pub total_follow_ups: u32,
    pub scoring: ScoringRules,
    pub scored_scenarios: usize,
    pub unscored_scenarios: usize,
    pub competencies: Vec<CompetencySummary>,
    pub scenarios: Vec<ScenarioResult>,
}

/// Report plus the conversation with penalty scores written onto base entries.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub report: CompetencyReport,
    pub entries: Vec<ConversationEntry>,
}

// ────────────────────────────────────────────────────────────────────────────
// Grouping
// ────────────────────────────────────────────────────────────────────────────

/// Indices into the conversation belonging to one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioGroup {
    pub key: String,
    pub indices: Vec<usize>,
}

impl ScenarioGroup {
    pub fn base_index(&self, entries: &[ConversationEntry]) -> usize {
        self.indices
            .iter()
            .copied()
            .find(|&i| entries[i].follow_up_sequence == 0 && !entries[i].is_follow_up)
            .unwrap_or(self.indices[0])
    }

    pub fn follow_up_count(&self, entries: &[ConversationEntry]) -> u32 {
        self.indices
            .iter()
            .filter(|&&i| entries[i].is_follow_up)
            .count() as u32
    }

    /// The last evaluation in conversation order, if any entry was scored.
    pub fn final_evaluation<'a>(
        &self,
        entries: &'a [ConversationEntry],
    ) -> Option<&'a EvaluationResult> {
        self.indices
            .iter()
            .rev()
            .find_map(|&i| entries[i].evaluation.as_ref())
    }

    pub fn last_index(&self) -> usize {
        self.indices[self.indices.len() - 1]
    }
}

pub fn group_by_scenario(entries: &[ConversationEntry]) -> Vec<ScenarioGroup> {
    let mut groups: Vec<ScenarioGroup> = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let key = match entry.scenario_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("entry-{index}"),
        };

        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.indices.push(index),
            None => groups.push(ScenarioGroup {
                key,
                indices: vec![index],
            }),
        }
    }

    groups
}

// ────────────────────────────────────────────────────────────────────────────
// Aggregation
// ────────────────────────────────────────────────────────────────────────────

pub fn aggregate(mut entries: Vec<ConversationEntry>, rules: &ScoringRules) -> Aggregation {
    let groups = group_by_scenario(&entries);
    let mut scenarios = Vec::with_capacity(groups.len());

    for group in &groups {
        let base = group.base_index(&entries);
        let follow_up_count = group.follow_up_count(&entries);
        let competency = resolve_competency(group, base, &entries);
        let question = entries[base].question.clone();

        let result = match group.final_evaluation(&entries) {
            Some(evaluation) => {
                // Stored conversations come from clients; keep scores on the scale.
                let score = evaluation.score.clamp(MIN_SCORE, MAX_SCORE);
                let outcome = apply_penalty(score as f64, follow_up_count, rules);
                let result = ScenarioResult {
                    scenario_id: group.key.clone(),
                    competency,
                    question,
                    follow_up_count,
                    scored: true,
                    pre_penalty_score: Some(outcome.pre_penalty_score),
                    post_penalty_score: Some(outcome.post_penalty_score),
                    penalty_applied: outcome.penalty_applied,
                    rationale: Some(evaluation.rationale.clone()).filter(|r| !r.is_empty()),
                    missing_aspects: evaluation.missing_aspects.clone(),
                    used_fallback: evaluation.is_fallback(),
                };
                entries[base].pre_penalty_score = Some(outcome.pre_penalty_score);
                entries[base].post_penalty_score = Some(outcome.post_penalty_score);
                result
            }
            None => ScenarioResult {
                scenario_id: group.key.clone(),
                competency,
                question,
                follow_up_count,
                scored: false,
                pre_penalty_score: None,
                post_penalty_score: None,
                penalty_applied: 0.0,
                rationale: None,
                missing_aspects: vec![],
                used_fallback: false,
            },
        };

        scenarios.push(result);
    }

    let competencies = summarize_by_competency(&scenarios);
    let scored: Vec<&ScenarioResult> = scenarios.iter().filter(|s| s.scored).collect();
    let overall_pre = mean(scored.iter().filter_map(|s| s.pre_penalty_score));
    let overall_post = mean(scored.iter().filter_map(|s| s.post_penalty_score));

    let report = CompetencyReport {
        overall_pre_penalty_score: overall_pre,
        overall_post_penalty_score: overall_post,
        overall_rating: overall_post.map(RatingBand::from_score),
        total_follow_ups: scenarios.iter().map(|s| s.follow_up_count).sum(),
        scoring: *rules,
        scored_scenarios: scored.len(),
        unscored_scenarios: scenarios.len() - scored.len(),
        competencies,
        scenarios,
    };

    Aggregation { report, entries }
}

fn resolve_competency(group: &ScenarioGroup, base: usize, entries: &[ConversationEntry]) -> String {
    let non_blank = |c: &Option<String>| {
        c.as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    };

    non_blank(&entries[base].competency)
        .or_else(|| {
            group
                .indices
                .iter()
                .find_map(|&i| non_blank(&entries[i].competency))
        })
        .unwrap_or_else(|| UNASSIGNED_COMPETENCY.to_string())
}

fn summarize_by_competency(scenarios: &[ScenarioResult]) -> Vec<CompetencySummary> {
    let mut names: Vec<&str> = Vec::new();
    for scenario in scenarios {
        if !names.contains(&scenario.competency.as_str()) {
            names.push(&scenario.competency);
        }
    }

    names
        .into_iter()
        .map(|name| {
            let members: Vec<&ScenarioResult> =
                scenarios.iter().filter(|s| s.competency == name).collect();
            let scored: Vec<&&ScenarioResult> = members.iter().filter(|s| s.scored).collect();
            let average_post = mean(scored.iter().filter_map(|s| s.post_penalty_score));

            CompetencySummary {
                competency: name.to_string(),
                scenario_count: members.len(),
                scored_scenario_count: scored.len(),
                average_pre_penalty_score: mean(scored.iter().filter_map(|s| s.pre_penalty_score)),
                average_post_penalty_score: average_post,
                total_follow_ups: members.iter().map(|s| s.follow_up_count).sum(),
                rating: average_post.map(RatingBand::from_score),
                summary: None,
                code: None,
                name: None,
                description: None,
                meta_competency: None,
            }
        })
        .collect()
}

/// Attaches dictionary entries to report competencies by code or name.
/// `catalog` is ordered by precedence (tenant rows before global ones); the
/// first match wins. Inactive entries are skipped.
pub fn annotate_competencies(report: &mut CompetencyReport, catalog: &[CompetencyRow]) {
    for summary in report.competencies.iter_mut() {
        let Some(entry) = catalog
            .iter()
            .filter(|c| c.is_active)
            .find(|c| c.matches_label(&summary.competency))
        else {
            continue;
        };
        summary.code = Some(entry.competency_code.clone());
        summary.name = Some(entry.competency_name.clone());
        summary.description = entry.competency_description.clone();
        summary.meta_competency = entry.meta_competency.clone();
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| round2(sum / count as f64))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::conversation::EvaluationSource;

    fn evaluation(score: u8) -> EvaluationResult {
        EvaluationResult {
            score,
            is_complete: score >= 4,
            missing_aspects: if score >= 4 {
                vec![]
            } else {
                vec!["follow-through".to_string()]
            },
            follow_up_question: None,
            rationale: format!("scored {score}"),
            strengths: vec![],
            source: EvaluationSource::Llm,
        }
    }

    fn entry(
        scenario: &str,
        competency: Option<&str>,
        sequence: u32,
        score: Option<u8>,
    ) -> ConversationEntry {
        ConversationEntry {
            scenario_id: Some(scenario.to_string()),
            question: format!("{scenario} q{sequence}"),
            answer: "answer".to_string(),
            competency: competency.map(str::to_string),
            is_follow_up: sequence > 0,
            follow_up_sequence: sequence,
            evaluation: score.map(evaluation),
            ..Default::default()
        }
    }

    fn rules() -> ScoringRules {
        ScoringRules {
            max_follow_ups: 2,
            follow_up_penalty_percent: 10.0,
        }
    }

    #[test]
    fn test_groups_preserve_first_seen_order() {
        let entries = vec![
            entry("s2", None, 0, Some(4)),
            entry("s1", None, 0, Some(2)),
            entry("s1", None, 1, Some(3)),
            entry("s2", None, 1, None),
        ];
        let groups = group_by_scenario(&entries);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "s2");
        assert_eq!(groups[0].indices, vec![0, 3]);
        assert_eq!(groups[1].indices, vec![1, 2]);
    }

    #[test]
    fn test_entries_without_scenario_get_their_own_group() {
        let mut a = entry("x", None, 0, Some(3));
        a.scenario_id = None;
        let mut b = entry("x", None, 0, Some(4));
        b.scenario_id = Some("  ".to_string());
        let groups = group_by_scenario(&[a, b]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "entry-0");
        assert_eq!(groups[1].key, "entry-1");
    }

    #[test]
    fn test_final_score_comes_from_last_evaluated_follow_up() {
        let entries = vec![
            entry("s1", Some("Communication"), 0, Some(2)),
            entry("s1", Some("Communication"), 1, Some(4)),
        ];
        let aggregation = aggregate(entries, &rules());
        let scenario = &aggregation.report.scenarios[0];

        assert_eq!(scenario.follow_up_count, 1);
        assert_eq!(scenario.pre_penalty_score, Some(4.0));
        assert_eq!(scenario.post_penalty_score, Some(3.6));
        assert_eq!(scenario.penalty_applied, 0.4);
        assert_eq!(scenario.question, "s1 q0");
    }

    #[test]
    fn test_base_entry_is_annotated() {
        let entries = vec![
            entry("s1", Some("Communication"), 0, Some(3)),
            entry("s1", Some("Communication"), 1, Some(3)),
        ];
        let aggregation = aggregate(entries, &rules());
        assert_eq!(aggregation.entries[0].pre_penalty_score, Some(3.0));
        assert_eq!(aggregation.entries[0].post_penalty_score, Some(2.7));
        assert!(aggregation.entries[1].pre_penalty_score.is_none());
    }

    #[test]
    fn test_unscored_scenarios_are_excluded_from_averages() {
        let entries = vec![
            entry("s1", Some("Teamwork"), 0, Some(5)),
            entry("s2", Some("Teamwork"), 0, None),
        ];
        let report = aggregate(entries, &rules()).report;

        assert_eq!(report.scored_scenarios, 1);
        assert_eq!(report.unscored_scenarios, 1);
        assert_eq!(report.overall_post_penalty_score, Some(5.0));
        let teamwork = &report.competencies[0];
        assert_eq!(teamwork.scenario_count, 2);
        assert_eq!(teamwork.scored_scenario_count, 1);
        assert_eq!(teamwork.average_post_penalty_score, Some(5.0));
        assert_eq!(teamwork.rating, Some(RatingBand::Exceptional));
    }

    #[test]
    fn test_competency_rollup_averages_post_penalty_scores() {
        let entries = vec![
            entry("s1", Some("Communication"), 0, Some(4)),
            entry("s2", Some("Communication"), 0, Some(2)),
            entry("s2", Some("Communication"), 1, Some(3)),
            entry("s3", Some("Integrity"), 0, Some(5)),
        ];
        let report = aggregate(entries, &rules()).report;

        assert_eq!(report.competencies.len(), 2);
        let communication = &report.competencies[0];
        assert_eq!(communication.competency, "Communication");
        // s1: 4.0, s2: 3 * 0.9 = 2.7 -> mean 3.35
        assert_eq!(communication.average_post_penalty_score, Some(3.35));
        assert_eq!(communication.average_pre_penalty_score, Some(3.5));
        assert_eq!(communication.total_follow_ups, 1);
        assert_eq!(communication.rating, Some(RatingBand::Developing));
        assert_eq!(report.competencies[1].competency, "Integrity");
        assert_eq!(report.total_follow_ups, 1);
    }

    #[test]
    fn test_missing_competency_falls_back_to_follow_up_then_unassigned() {
        let entries = vec![
            entry("s1", None, 0, Some(4)),
            entry("s1", Some("Ownership"), 1, Some(4)),
            entry("s2", None, 0, Some(4)),
        ];
        let report = aggregate(entries, &rules()).report;
        assert_eq!(report.scenarios[0].competency, "Ownership");
        assert_eq!(report.scenarios[1].competency, UNASSIGNED_COMPETENCY);
    }

    #[test]
    fn test_empty_conversation_produces_empty_report() {
        let report = aggregate(vec![], &rules()).report;
        assert!(report.scenarios.is_empty());
        assert!(report.competencies.is_empty());
        assert!(report.overall_post_penalty_score.is_none());
        assert!(report.overall_rating.is_none());
    }

    #[test]
    fn test_fallback_evaluations_are_flagged() {
        let mut e = entry("s1", Some("Communication"), 0, Some(3));
        if let Some(evaluation) = e.evaluation.as_mut() {
            evaluation.source = EvaluationSource::Fallback;
        }
        let report = aggregate(vec![e], &rules()).report;
        assert!(report.scenarios[0].used_fallback);
        assert_eq!(report.scenarios[0].pre_penalty_score, Some(3.0));
    }

    #[test]
    fn test_out_of_range_client_scores_are_clamped() {
        let entries: Vec<ConversationEntry> = serde_json::from_value(serde_json::json!([
            {"scenario_id": "s1", "question": "q", "answer": "a",
             "evaluation": {"score": 0, "is_complete": false}},
            {"scenario_id": "s1", "question": "f", "answer": "a", "is_follow_up": true,
             "follow_up_sequence": 1, "evaluation": {"score": 0, "is_complete": true}},
            {"scenario_id": "s2", "question": "q", "answer": "a",
             "evaluation": {"score": 9, "is_complete": true}}
        ]))
        .unwrap();
        let report = aggregate(entries, &rules()).report;

        let low = &report.scenarios[0];
        assert_eq!(low.pre_penalty_score, Some(1.0));
        assert_eq!(low.post_penalty_score, Some(1.0));
        assert_eq!(low.penalty_applied, 0.0);
        let high = &report.scenarios[1];
        assert_eq!(high.pre_penalty_score, Some(5.0));
        assert_eq!(high.post_penalty_score, Some(5.0));
        assert_eq!(report.overall_post_penalty_score, Some(3.0));
        assert_eq!(report.overall_rating, Some(RatingBand::Developing));
    }

    #[test]
    fn test_annotation_prefers_first_matching_active_entry() {
        use crate::models::competency::tests::competency;

        let entries = vec![
            entry("s1", Some("comm"), 0, Some(4)),
            entry("s2", Some("Ownership"), 0, Some(3)),
            entry("s3", Some("Unknown skill"), 0, Some(3)),
        ];
        let mut report = aggregate(entries, &rules()).report;

        let mut retired = competency("OWN", "Ownership", None);
        retired.is_active = false;
        let mut tenant_comm = competency("COMM", "Client Communication", Some(uuid::Uuid::new_v4()));
        tenant_comm.competency_description = Some("Explains clearly to clients.".to_string());
        let catalog = vec![tenant_comm, competency("COMM", "Communication", None), retired];
        annotate_competencies(&mut report, &catalog);

        let comm = &report.competencies[0];
        assert_eq!(comm.code.as_deref(), Some("COMM"));
        assert_eq!(comm.display_name(), "Client Communication");
        assert_eq!(comm.description.as_deref(), Some("Explains clearly to clients."));
        assert_eq!(comm.meta_competency.as_deref(), Some("Interpersonal"));
        assert!(report.competencies[1].name.is_none());
        assert_eq!(report.competencies[2].display_name(), "Unknown skill");
    }

    #[test]
    fn test_rating_bands() {
        assert_eq!(RatingBand::from_score(4.5), RatingBand::Exceptional);
        assert_eq!(RatingBand::from_score(3.5), RatingBand::Proficient);
        assert_eq!(RatingBand::from_score(2.5), RatingBand::Developing);
        assert_eq!(RatingBand::from_score(2.49), RatingBand::NeedsImprovement);
    }
}
