use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::assessment::AssessmentId;
use crate::directory::MemberId;

pub type ApprovalId = uuid::Uuid;

/// One deacon's ratification of one review cycle.
///
/// Records are append-only and never deleted; they are the permanent audit
/// trail. The cycle number is stored explicitly rather than inferred from
/// dates, and `(assessment_id, cycle, approver)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: ApprovalId,
    pub assessment_id: AssessmentId,
    pub cycle: u32,
    pub approver: MemberId,
    pub approved_on: NaiveDate,
    pub notes: String,
}

impl ApprovalRecord {
    pub fn new(
        assessment_id: AssessmentId,
        cycle: u32,
        approver: MemberId,
        approved_on: NaiveDate,
        notes: String,
    ) -> Self {
        Self {
            id: ApprovalId::new_v4(),
            assessment_id,
            cycle,
            approver,
            approved_on,
            notes,
        }
    }
}

/// Result of a `record_approval` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    /// Whether at least one new approval record was written (resubmitted
    /// approvers are a no-op, not an error).
    pub approval_recorded: bool,
    /// Distinct approvers in the current cycle after this call.
    pub total_approvals: u32,
    pub minimum_required: u32,
    /// True when this call closed the cycle.
    pub assessment_approved: bool,
    pub next_review_date: Option<NaiveDate>,
}
