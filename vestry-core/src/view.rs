use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::approval::ApprovalRecord;
use crate::assessment::{AlertStatus, AssessmentId, ReviewStatus, RiskAssessment};
use crate::category::CategoryId;

/// Read model returned by the interactive endpoints: the stored assessment
/// plus the facts derived from it at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentView {
    pub id: AssessmentId,
    pub category_id: CategoryId,
    pub category_name: String,
    pub title: String,
    pub description: String,
    pub scope: String,
    pub notes: String,
    pub review_interval_years: u8,
    pub status: ReviewStatus,
    pub current_cycle: u32,
    pub last_review_date: Option<NaiveDate>,
    pub next_review_date: Option<NaiveDate>,
    /// Distinct approvers in the current cycle.
    pub approval_count: u32,
    pub minimum_required: u32,
    pub is_overdue: bool,
    pub alert_status: AlertStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub modified_by: String,
    pub modified_at: DateTime<Utc>,
}

impl AssessmentView {
    pub fn from_parts(
        assessment: RiskAssessment,
        category_name: String,
        approval_count: u32,
        is_overdue: bool,
        alert_status: AlertStatus,
    ) -> Self {
        Self {
            id: assessment.id,
            category_id: assessment.category_id,
            category_name,
            title: assessment.title,
            description: assessment.description,
            scope: assessment.scope,
            notes: assessment.notes,
            review_interval_years: assessment.review_interval_years,
            status: assessment.status,
            current_cycle: assessment.current_cycle,
            last_review_date: assessment.last_review_date,
            next_review_date: assessment.next_review_date,
            approval_count,
            minimum_required: assessment.minimum_approvals,
            is_overdue,
            alert_status,
            created_by: assessment.created_by,
            created_at: assessment.created_at,
            modified_by: assessment.modified_by,
            modified_at: assessment.modified_at,
        }
    }
}

/// Audit history of one assessment, most recent cycle first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentHistory {
    pub assessment_id: AssessmentId,
    pub title: String,
    pub category_name: String,
    pub cycles: Vec<CycleHistory>,
}

/// One review cycle's approvals, grouped by the stored cycle number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleHistory {
    pub cycle: u32,
    /// Closure date of the cycle; None while the cycle is still collecting
    /// approvals.
    pub review_date: Option<NaiveDate>,
    pub approvals: Vec<ApprovalRecord>,
}
