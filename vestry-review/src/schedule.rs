//! Pure calendar-date derivations. Nothing here mutates stored state; the
//! review service writes `next_review_date` using the dates computed here,
//! and everything else is recomputed at read time.

use chrono::{Days, Months, NaiveDate};

use vestry_core::assessment::{AlertStatus, ReviewStatus, RiskAssessment};

/// An approved assessment within this many days of its due date is flagged
/// DueSoon.
pub const DUE_SOON_WINDOW_DAYS: u64 = 30;

/// Calendar-year addition: `last_review + interval_years`. Feb 29 clamps to
/// Feb 28 in non-leap target years. Returns None only when the result falls
/// outside chrono's representable range.
pub fn next_due_date(last_review: NaiveDate, interval_years: u8) -> Option<NaiveDate> {
    last_review.checked_add_months(Months::new(u32::from(interval_years) * 12))
}

/// Upper bound of the reconciler's due window.
pub fn due_cutoff(today: NaiveDate, lookahead_days: u32) -> NaiveDate {
    today
        .checked_add_days(Days::new(u64::from(lookahead_days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Overdue means approved and past due. Draft and UnderReview assessments
/// are being actively handled and never count as overdue.
pub fn is_overdue(assessment: &RiskAssessment, today: NaiveDate) -> bool {
    assessment.status == ReviewStatus::Approved
        && assessment.next_review_date.is_some_and(|due| due < today)
}

pub fn alert_status(assessment: &RiskAssessment, today: NaiveDate) -> AlertStatus {
    if assessment.status != ReviewStatus::Approved {
        return AlertStatus::Current;
    }
    let Some(due) = assessment.next_review_date else {
        return AlertStatus::Current;
    };
    if due < today {
        AlertStatus::Overdue
    } else if due < due_cutoff(today, DUE_SOON_WINDOW_DAYS as u32) {
        AlertStatus::DueSoon
    } else {
        AlertStatus::Current
    }
}
