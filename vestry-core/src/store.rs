use async_trait::async_trait;
use chrono::NaiveDate;

use crate::approval::ApprovalRecord;
use crate::assessment::{AssessmentId, ReviewStatus, RiskAssessment};
use crate::category::{CategoryId, RiskAssessmentCategory};
use crate::directory::MemberId;
use crate::error::VestryError;

/// Filters for the assessment list endpoint. Overdue-only filtering is a
/// derived-date concern applied by the service, not here.
#[derive(Debug, Clone, Default)]
pub struct AssessmentFilter {
    pub category_id: Option<CategoryId>,
    pub status: Option<ReviewStatus>,
    /// Case-insensitive substring match on the title.
    pub title_contains: Option<String>,
}

/// Persistent store for assessments.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn insert(&self, assessment: &RiskAssessment) -> Result<(), VestryError>;

    async fn get(&self, id: AssessmentId) -> Result<Option<RiskAssessment>, VestryError>;

    /// Write back an assessment guarded by its version: the row is updated
    /// only if the stored version still equals `expected_version`, and the
    /// stored version becomes `assessment.version`. Returns false when the
    /// guard fails (a concurrent writer won).
    async fn update_versioned(
        &self,
        assessment: &RiskAssessment,
        expected_version: i64,
    ) -> Result<bool, VestryError>;

    async fn list(&self, filter: &AssessmentFilter) -> Result<Vec<RiskAssessment>, VestryError>;

    /// Approved assessments whose next review date is on or before `cutoff`,
    /// i.e. the reconciler's due window.
    async fn list_due(&self, cutoff: NaiveDate) -> Result<Vec<RiskAssessment>, VestryError>;
}

/// Append-only store for approval records.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Appends one record. Fails with `Validation` when
    /// `(assessment_id, cycle, approver)` already exists.
    async fn append(&self, record: &ApprovalRecord) -> Result<(), VestryError>;

    async fn for_cycle(
        &self,
        assessment_id: AssessmentId,
        cycle: u32,
    ) -> Result<Vec<ApprovalRecord>, VestryError>;

    async fn for_assessment(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<Vec<ApprovalRecord>, VestryError>;

    async fn count_distinct_approvers(
        &self,
        assessment_id: AssessmentId,
        cycle: u32,
    ) -> Result<u32, VestryError>;

    async fn approvers_for_cycle(
        &self,
        assessment_id: AssessmentId,
        cycle: u32,
    ) -> Result<Vec<MemberId>, VestryError>;
}

/// Lookup-only view of assessment categories; category CRUD lives elsewhere
/// in the application.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn get(&self, id: CategoryId) -> Result<Option<RiskAssessmentCategory>, VestryError>;
}
