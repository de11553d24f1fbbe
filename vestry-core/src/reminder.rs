use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::assessment::AssessmentId;
use crate::category::CategoryId;
use crate::error::VestryError;

/// A reminder write keyed for idempotency.
///
/// The key is the composite `risk-assessment:{assessment_id}:{cycle}`
/// string, so repeated reconciler runs against unchanged data converge on a
/// single reminder and a title edit never orphans one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderUpsert {
    pub key: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub priority: bool,
    pub category_id: CategoryId,
    pub assignee: Option<String>,
}

pub fn reminder_key(assessment_id: AssessmentId, cycle: u32) -> String {
    format!("risk-assessment:{assessment_id}:{cycle}")
}

/// Narrow view onto the application's reminder module.
///
/// `upsert` must be safe to call repeatedly with the same key: an existing
/// reminder under the key gets its due date, priority and description
/// updated in place rather than duplicated.
#[async_trait]
pub trait ReminderSink: Send + Sync {
    async fn category_id_by_name(&self, name: &str) -> Result<Option<CategoryId>, VestryError>;
    async fn upsert(&self, reminder: ReminderUpsert) -> Result<(), VestryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_per_assessment_and_cycle() {
        let id = AssessmentId::new_v4();
        assert_eq!(reminder_key(id, 2), format!("risk-assessment:{id}:2"));
        assert_ne!(reminder_key(id, 2), reminder_key(id, 3));
        assert_ne!(reminder_key(id, 2), reminder_key(AssessmentId::new_v4(), 2));
    }
}
