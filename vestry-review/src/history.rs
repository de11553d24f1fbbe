//! Audit-history reconstruction: approval records grouped strictly by their
//! stored cycle number, most recent cycle first.

use std::collections::BTreeMap;

use vestry_core::approval::ApprovalRecord;
use vestry_core::assessment::{ReviewStatus, RiskAssessment};
use vestry_core::view::CycleHistory;

/// Assemble the ordered cycle list for one assessment.
///
/// A cycle's review date is the assessment's `last_review_date` when it is
/// the most recently closed cycle, the maximum `approved_on` among its
/// records for older closed cycles, and `None` for the cycle still under
/// review. The open cycle is listed even before its first approval arrives.
pub fn reconstruct(assessment: &RiskAssessment, records: &[ApprovalRecord]) -> Vec<CycleHistory> {
    let mut by_cycle: BTreeMap<u32, Vec<ApprovalRecord>> = BTreeMap::new();
    for record in records {
        by_cycle
            .entry(record.cycle)
            .or_default()
            .push(record.clone());
    }
    if assessment.status == ReviewStatus::UnderReview {
        by_cycle.entry(assessment.current_cycle).or_default();
    }

    let open_cycle = match assessment.status {
        ReviewStatus::UnderReview => Some(assessment.current_cycle),
        _ => None,
    };
    let last_closed = assessment.last_closed_cycle();

    let mut cycles: Vec<CycleHistory> = by_cycle
        .into_iter()
        .map(|(cycle, mut approvals)| {
            approvals.sort_by(|a, b| {
                a.approved_on
                    .cmp(&b.approved_on)
                    .then(a.approver.cmp(&b.approver))
            });
            let review_date = if open_cycle == Some(cycle) {
                None
            } else if last_closed == Some(cycle) {
                assessment.last_review_date
            } else {
                approvals.iter().map(|a| a.approved_on).max()
            };
            CycleHistory {
                cycle,
                review_date,
                approvals,
            }
        })
        .collect();

    cycles.reverse();
    cycles
}
