use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const ASSIGNMENT_ASSIGNED: &str = "assigned";
pub const ASSIGNMENT_STARTED: &str = "started";
pub const ASSIGNMENT_COMPLETED: &str = "completed";
pub const ASSIGNMENT_OVERDUE: &str = "overdue";
pub const ASSIGNMENT_CANCELLED: &str = "cancelled";

pub const ASSIGNMENT_STATUSES: [&str; 5] = [
    ASSIGNMENT_ASSIGNED,
    ASSIGNMENT_STARTED,
    ASSIGNMENT_COMPLETED,
    ASSIGNMENT_OVERDUE,
    ASSIGNMENT_CANCELLED,
];

/// A test type assigned to one candidate. At most one per (user, test type).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestAssignmentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub test_type: String,
    pub due_date: Option<DateTime<Utc>>,
    pub max_attempts: i32,
    pub status: String,
    pub notes: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TestAssignmentRow {
    /// Cancelled assignments and ones past their due date admit no new attempts.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        if self.status == ASSIGNMENT_CANCELLED || self.status == ASSIGNMENT_OVERDUE {
            return false;
        }
        self.due_date.map_or(true, |due| now <= due)
    }

    pub fn attempt_limit(&self) -> u32 {
        u32::try_from(self.max_attempts).unwrap_or(0)
    }
}
