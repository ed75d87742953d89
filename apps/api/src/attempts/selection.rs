//! Question selection for a new attempt.
//!
//! Selection is deterministic so two candidates on the same configuration see
//! the same questions: when an SJT configuration asks for fewer scenarios than
//! it defines, scenarios are ordered by id before the first `n` are taken.

use crate::configurations::validation::MAX_AI_GENERATED_QUESTIONS;
use crate::models::configuration::{
    JdtConfig, JdtRole, Scenario, ServedJdtQuestion, AI_ASSESSED_COMPETENCY,
};

/// Stand-in for a question the interviewer generates from the job description.
pub const AI_PLACEHOLDER_QUESTION: &str = "AI generated question placeholder";
pub const AI_PLACEHOLDER_RUBRIC: &str = "Evaluate for clarity and relevance to the role";

pub fn select_sjt_scenarios(scenarios: &[Scenario], number_of_questions: Option<u32>) -> Vec<Scenario> {
    let n = number_of_questions
        .map(|n| n as usize)
        .filter(|&n| n > 0)
        .unwrap_or(scenarios.len());

    let mut pool = scenarios.to_vec();
    if n < pool.len() {
        pool.sort_by(|a, b| a.id.cmp(&b.id));
    }
    pool.truncate(n);
    pool
}

#[derive(Debug, Clone, PartialEq)]
pub struct JdtSelection {
    pub role_name: Option<String>,
    pub job_description: Option<String>,
    pub questions: Vec<ServedJdtQuestion>,
}

/// Picks the role named `role_category` (else the first role), its first
/// `numberOfQuestions` manual questions, then `aiGeneratedQuestions` placeholders.
/// Placeholders are capped so configs stored before validation cannot blow up a start.
pub fn select_jdt_questions(config: &JdtConfig, role_category: Option<&str>) -> JdtSelection {
    let role = role_category
        .and_then(|wanted| find_role(&config.roles, wanted))
        .or_else(|| config.roles.first());

    let manual = role.map(|r| r.questions.as_slice()).unwrap_or_default();
    let n = config
        .settings
        .number_of_questions
        .map(|n| n as usize)
        .filter(|&n| n > 0)
        .unwrap_or(manual.len());

    let mut questions: Vec<ServedJdtQuestion> = manual
        .iter()
        .take(n)
        .map(|q| ServedJdtQuestion {
            question: q.text.clone(),
            preferred_answer: q.preferred_answer.clone(),
            competency: q.competency.clone(),
        })
        .collect();

    let ai_count = config
        .settings
        .ai_generated_questions
        .unwrap_or(0)
        .min(MAX_AI_GENERATED_QUESTIONS);
    questions.extend((0..ai_count).map(|_| ServedJdtQuestion {
        question: AI_PLACEHOLDER_QUESTION.to_string(),
        preferred_answer: Some(AI_PLACEHOLDER_RUBRIC.to_string()),
        competency: Some(AI_ASSESSED_COMPETENCY.to_string()),
    }));

    JdtSelection {
        role_name: role.map(|r| r.role_name.clone()),
        job_description: role.and_then(|r| r.job_description.clone()),
        questions,
    }
}

fn find_role<'a>(roles: &'a [JdtRole], wanted: &str) -> Option<&'a JdtRole> {
    let wanted = wanted.trim();
    roles
        .iter()
        .find(|r| r.role_name.trim().eq_ignore_ascii_case(wanted))
}
