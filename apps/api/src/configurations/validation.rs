//! Typed parsing and validation of admin `config_data` payloads.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::configuration::{ConfigType, JdtConfig, SjtConfig};

/// Upper bound on follow-ups per scenario an admin may configure.
pub const MAX_FOLLOW_UPS_LIMIT: u32 = 5;

/// Upper bound on interviewer-generated JDT questions per attempt.
pub const MAX_AI_GENERATED_QUESTIONS: u32 = 20;

pub fn parse_sjt(data: &Value) -> Result<SjtConfig, AppError> {
    parse_typed(data, "SJT")
}

pub fn parse_jdt(data: &Value) -> Result<JdtConfig, AppError> {
    parse_typed(data, "JDT")
}

fn parse_typed<T: DeserializeOwned>(data: &Value, label: &str) -> Result<T, AppError> {
    serde_json::from_value(data.clone())
        .map_err(|e| AppError::Validation(format!("Invalid {label} configuration: {e}")))
}

/// Validates `config_data` against the rules of its configuration type.
pub fn validate_config_data(config_type: ConfigType, data: &Value) -> Result<(), AppError> {
    match config_type {
        ConfigType::Sjt => validate_sjt(&parse_sjt(data)?),
        ConfigType::Jdt => validate_jdt(&parse_jdt(data)?),
        ConfigType::Global => {
            if data.is_object() {
                Ok(())
            } else {
                Err(AppError::Validation(
                    "Global configuration must be a JSON object".to_string(),
                ))
            }
        }
    }
}

pub fn validate_sjt(config: &SjtConfig) -> Result<(), AppError> {
    if config.scenarios.is_empty() {
        return Err(invalid("SJT configuration needs at least one scenario"));
    }

    let mut seen = HashSet::new();
    for (index, scenario) in config.scenarios.iter().enumerate() {
        let id = scenario.id.trim();
        if id.is_empty() {
            return Err(invalid(format!("Scenario {} has an empty id", index + 1)));
        }
        if !seen.insert(id) {
            return Err(invalid(format!("Duplicate scenario id '{id}'")));
        }
        if scenario.situation.trim().is_empty() {
            return Err(invalid(format!("Scenario '{id}' has an empty situation")));
        }
    }

    let settings = &config.settings;
    if settings.number_of_questions == Some(0) {
        return Err(invalid("numberOfQuestions must be at least 1"));
    }
    if let Some(max) = settings.max_follow_ups {
        if max > MAX_FOLLOW_UPS_LIMIT {
            return Err(invalid(format!(
                "maxFollowUps must be between 0 and {MAX_FOLLOW_UPS_LIMIT}"
            )));
        }
    }
    if let Some(percent) = settings.follow_up_penalty_percent {
        if !(0.0..=100.0).contains(&percent) {
            return Err(invalid("followUpPenaltyPercent must be between 0 and 100"));
        }
    }
    if settings.max_attempts == Some(0) {
        return Err(invalid("maxAttempts must be at least 1"));
    }

    Ok(())
}

pub fn validate_jdt(config: &JdtConfig) -> Result<(), AppError> {
    if config.roles.is_empty() {
        return Err(invalid("JDT configuration needs at least one role"));
    }

    for role in &config.roles {
        if role.role_name.trim().is_empty() {
            return Err(invalid("Every JDT role needs a roleName"));
        }
        if role.questions.is_empty() {
            return Err(invalid(format!(
                "Role '{}' needs at least one question",
                role.role_name
            )));
        }
        if role.questions.iter().any(|q| q.text.trim().is_empty()) {
            return Err(invalid(format!(
                "Role '{}' has a question with empty text",
                role.role_name
            )));
        }
    }

    let settings = &config.settings;
    if settings.number_of_questions == Some(0) {
        return Err(invalid("numberOfQuestions must be at least 1"));
    }
    if let Some(ai) = settings.ai_generated_questions {
        if ai > MAX_AI_GENERATED_QUESTIONS {
            return Err(invalid(format!(
                "aiGeneratedQuestions must be between 0 and {MAX_AI_GENERATED_QUESTIONS}"
            )));
        }
    }
    if settings.max_attempts == Some(0) {
        return Err(invalid("maxAttempts must be at least 1"));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Validation(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sjt(settings: Value) -> Value {
        json!({
            "scenarios": [
                {"id": "s1", "situation": "A deadline slips.", "competency": "Ownership"},
                {"id": "s2", "situation": "A client is upset.", "competency": "Communication"}
            ],
            "settings": settings
        })
    }

    #[test]
    fn test_valid_sjt_passes() {
        let data = sjt(json!({"maxFollowUps": 2, "followUpPenaltyPercent": 10}));
        assert!(validate_config_data(ConfigType::Sjt, &data).is_ok());
    }

    #[test]
    fn test_sjt_without_scenarios_rejected() {
        let data = json!({"scenarios": []});
        assert!(matches!(
            validate_config_data(ConfigType::Sjt, &data),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_scenario_ids_rejected() {
        let data = json!({"scenarios": [
            {"id": "s1", "situation": "a"},
            {"id": " s1 ", "situation": "b"}
        ]});
        let err = validate_config_data(ConfigType::Sjt, &data).unwrap_err();
        assert!(err.to_string().contains("Duplicate scenario id 's1'"));
    }

    #[test]
    fn test_follow_up_bounds_enforced() {
        let data = sjt(json!({"maxFollowUps": 6}));
        assert!(validate_config_data(ConfigType::Sjt, &data).is_err());
        let data = sjt(json!({"followUpPenaltyPercent": 101}));
        assert!(validate_config_data(ConfigType::Sjt, &data).is_err());
        let data = sjt(json!({"followUpPenaltyPercent": 100, "maxFollowUps": 5}));
        assert!(validate_config_data(ConfigType::Sjt, &data).is_ok());
    }

    #[test]
    fn test_zero_questions_rejected() {
        let data = sjt(json!({"numberOfQuestions": 0}));
        assert!(validate_config_data(ConfigType::Sjt, &data).is_err());
    }

    #[test]
    fn test_jdt_role_needs_questions() {
        let data = json!({"roles": [{"roleName": "Engineer", "questions": []}]});
        assert!(validate_config_data(ConfigType::Jdt, &data).is_err());
        let data = json!({"roles": [{
            "roleName": "Engineer",
            "questions": [{"text": "Tell me about a project you led."}]
        }]});
        assert!(validate_config_data(ConfigType::Jdt, &data).is_ok());
    }

    fn jdt(settings: Value) -> Value {
        json!({
            "roles": [{"roleName": "Engineer", "questions": [{"text": "Why this team?"}]}],
            "settings": settings
        })
    }

    #[test]
    fn test_jdt_question_counts_bounded() {
        let data = jdt(json!({"numberOfQuestions": 0}));
        assert!(validate_config_data(ConfigType::Jdt, &data).is_err());
        let data = jdt(json!({"aiGeneratedQuestions": 4294967295u32}));
        let err = validate_config_data(ConfigType::Jdt, &data).unwrap_err();
        assert!(err.to_string().contains("aiGeneratedQuestions"));
        let data = jdt(json!({"aiQuestions": 21}));
        assert!(validate_config_data(ConfigType::Jdt, &data).is_err());
        let data = jdt(json!({"numberOfQuestions": 1, "aiGeneratedQuestions": 20}));
        assert!(validate_config_data(ConfigType::Jdt, &data).is_ok());
    }

    #[test]
    fn test_malformed_payload_is_validation_error() {
        let data = json!({"scenarios": "not a list"});
        assert!(matches!(
            validate_config_data(ConfigType::Sjt, &data),
            Err(AppError::Validation(_))
        ));
        assert!(validate_config_data(ConfigType::Global, &json!([1, 2])).is_err());
        assert!(validate_config_data(ConfigType::Global, &json!({"theme": "dark"})).is_ok());
    }
}
