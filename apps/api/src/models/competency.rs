use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One entry of the competency dictionary. `tenant_id = NULL` rows are the
/// global catalog every tenant inherits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompetencyRow {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub competency_code: String,
    pub competency_name: String,
    pub competency_description: Option<String>,
    pub meta_competency: Option<String>,
    pub category: Option<String>,
    pub industry: Option<String>,
    pub role_category: Option<String>,
    /// Localized names/descriptions keyed by language code.
    pub translations: Option<Value>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CompetencyRow {
    /// Scenario and question configs label competencies by code or by name.
    pub fn matches_label(&self, label: &str) -> bool {
        let label = label.trim();
        self.competency_code.trim().eq_ignore_ascii_case(label)
            || self.competency_name.trim().eq_ignore_ascii_case(label)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn competency(code: &str, name: &str, tenant_id: Option<Uuid>) -> CompetencyRow {
        CompetencyRow {
            id: Uuid::new_v4(),
            tenant_id,
            competency_code: code.to_string(),
            competency_name: name.to_string(),
            competency_description: Some(format!("{name} definition")),
            meta_competency: Some("Interpersonal".to_string()),
            category: None,
            industry: None,
            role_category: None,
            translations: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_matches_code_or_name_ignoring_case() {
        let row = competency("COMM", "Communication", None);
        assert!(row.matches_label("comm"));
        assert!(row.matches_label(" communication "));
        assert!(!row.matches_label("Ownership"));
    }
}
