//! Admin-defined test configuration: typed views over the JSONB `config_data`
//! column plus the `configurations` table row.
//!
//! Admin payloads arrive in camelCase (the shape the admin screens save), so the
//! typed structs rename accordingly and accept the older field names as aliases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Default scenario prompt when the admin only wrote the situation.
pub const DEFAULT_SCENARIO_QUESTION: &str = "What would you do in this situation?";

/// Attempts allowed per candidate when neither settings nor assignment say otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Competency tag used for JDT placeholder questions the AI fills in at interview time.
pub const AI_ASSESSED_COMPETENCY: &str = "AI-Assessed";

// ────────────────────────────────────────────────────────────────────────────
// Enumerations
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestType {
    #[serde(rename = "JDT", alias = "jdt")]
    Jdt,
    #[serde(rename = "SJT", alias = "sjt")]
    Sjt,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Jdt => "JDT",
            TestType::Sjt => "SJT",
        }
    }

    /// Case-insensitive parse of a stored or user-supplied test type.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "JDT" => Some(TestType::Jdt),
            "SJT" => Some(TestType::Sjt),
            _ => None,
        }
    }

    pub fn config_type(&self) -> ConfigType {
        match self {
            TestType::Jdt => ConfigType::Jdt,
            TestType::Sjt => ConfigType::Sjt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    Jdt,
    Sjt,
    Global,
}

impl ConfigType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::Jdt => "jdt",
            ConfigType::Sjt => "sjt",
            ConfigType::Global => "global",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "jdt" => Some(ConfigType::Jdt),
            "sjt" => Some(ConfigType::Sjt),
            "global" => Some(ConfigType::Global),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    System,
    #[default]
    Tenant,
}

impl ConfigScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigScope::System => "system",
            ConfigScope::Tenant => "tenant",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Row
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConfigurationRow {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub config_type: String,
    pub scope: String,
    pub config_data: Value,
    pub version: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// SJT
// ────────────────────────────────────────────────────────────────────────────

/// One situational-judgment scenario and its scoring rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub situation: String,
    #[serde(default = "default_scenario_question")]
    pub question: String,
    /// Why the best response is best. The rubric the LLM scores against.
    #[serde(default, alias = "bestReason")]
    pub best_response_rationale: String,
    #[serde(default, alias = "worstReason")]
    pub worst_response_rationale: String,
    #[serde(default)]
    pub competency: Option<String>,
}

fn default_scenario_question() -> String {
    DEFAULT_SCENARIO_QUESTION.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SjtSettings {
    pub number_of_questions: Option<u32>,
    /// Minutes.
    pub time_limit: Option<u32>,
    pub instructions: Option<String>,
    pub max_follow_ups: Option<u32>,
    #[serde(alias = "followUpPenalty", alias = "penaltyPercentage")]
    pub follow_up_penalty_percent: Option<f64>,
    pub max_attempts: Option<u32>,
}

impl SjtSettings {
    /// Resolves the follow-up budget and penalty against service defaults.
    pub fn scoring_rules(&self, defaults: ScoringRules) -> ScoringRules {
        ScoringRules {
            max_follow_ups: self.max_follow_ups.unwrap_or(defaults.max_follow_ups),
            follow_up_penalty_percent: self
                .follow_up_penalty_percent
                .unwrap_or(defaults.follow_up_penalty_percent),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SjtConfig {
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub settings: SjtSettings,
}

/// Effective follow-up budget and penalty for one SJT attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub max_follow_ups: u32,
    /// Per follow-up, 0–100.
    pub follow_up_penalty_percent: f64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            max_follow_ups: 2,
            follow_up_penalty_percent: 10.0,
        }
    }
}

impl ScoringRules {
    /// JDT answers get no follow-ups and no penalty.
    pub fn without_follow_ups() -> Self {
        Self {
            max_follow_ups: 0,
            follow_up_penalty_percent: 0.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JDT
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JdtQuestion {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub preferred_answer: Option<String>,
    #[serde(default)]
    pub competency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JdtRole {
    #[serde(default)]
    pub id: Option<String>,
    pub role_name: String,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub questions: Vec<JdtQuestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JdtSettings {
    pub number_of_questions: Option<u32>,
    #[serde(alias = "aiQuestions")]
    pub ai_generated_questions: Option<u32>,
    pub time_limit: Option<u32>,
    pub instructions: Option<String>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JdtConfig {
    pub roles: Vec<JdtRole>,
    #[serde(default)]
    pub settings: JdtSettings,
}

/// A JDT question as served to the candidate and snapshotted into the attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServedJdtQuestion {
    pub question: String,
    pub preferred_answer: Option<String>,
    pub competency: Option<String>,
}
