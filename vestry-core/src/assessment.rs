use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::category::CategoryId;

pub type AssessmentId = uuid::Uuid;

/// A risk assessment and its review-cycle state.
///
/// The review service is the single writer of `status`, `current_cycle`,
/// `last_review_date` and `next_review_date`; everything else is ordinary
/// editable metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub id: AssessmentId,
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub scope: String,
    pub notes: String,
    /// Years between reviews, 1..=5.
    pub review_interval_years: u8,
    pub status: ReviewStatus,
    /// Monotonically increasing; 0 while still in Draft, 1 from the first
    /// started review onward.
    pub current_cycle: u32,
    /// Set when a cycle closes; never cleared by a later reopen.
    pub last_review_date: Option<NaiveDate>,
    pub next_review_date: Option<NaiveDate>,
    /// Quorum captured from configuration at creation time so later config
    /// changes do not retroactively alter in-flight assessments.
    pub minimum_approvals: u32,
    /// Optimistic-concurrency counter, bumped on every stored write.
    pub version: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub modified_by: String,
    pub modified_at: DateTime<Utc>,
}

impl RiskAssessment {
    pub fn new(
        category_id: CategoryId,
        new: NewAssessment,
        minimum_approvals: u32,
        actor: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AssessmentId::new_v4(),
            category_id,
            title: new.title,
            description: new.description,
            scope: new.scope,
            notes: new.notes,
            review_interval_years: new.review_interval_years,
            status: ReviewStatus::Draft,
            current_cycle: 0,
            last_review_date: None,
            next_review_date: None,
            minimum_approvals,
            version: 0,
            created_by: actor.to_string(),
            created_at: now,
            modified_by: actor.to_string(),
            modified_at: now,
        }
    }

    pub fn touch(&mut self, actor: &str) {
        self.modified_by = actor.to_string();
        self.modified_at = Utc::now();
    }

    /// The cycle that produced the most recent closure, if any.
    ///
    /// Every cycle before the current one closed at quorum (a review can
    /// only be started from Draft or Approved), so while UnderReview the
    /// latest closed cycle is the previous one.
    pub fn last_closed_cycle(&self) -> Option<u32> {
        match self.status {
            ReviewStatus::Approved => Some(self.current_cycle),
            ReviewStatus::UnderReview if self.current_cycle > 1 => Some(self.current_cycle - 1),
            _ => None,
        }
    }
}

/// Caller-supplied fields for a new assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssessment {
    pub category_id: CategoryId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub notes: String,
    pub review_interval_years: u8,
}

/// Editable metadata; review state is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentPatch {
    pub title: String,
    pub description: String,
    pub scope: String,
    pub notes: String,
    pub review_interval_years: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Draft,
    UnderReview,
    Approved,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "under_review" => Some(Self::UnderReview),
            "approved" => Some(Self::Approved),
            _ => None,
        }
    }
}

/// Derived, never persisted; recomputed from the stored due date at read
/// time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Current,
    DueSoon,
    Overdue,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RiskAssessment {
        RiskAssessment::new(
            CategoryId::new_v4(),
            NewAssessment {
                category_id: CategoryId::new_v4(),
                title: "Ladder use".into(),
                description: String::new(),
                scope: String::new(),
                notes: String::new(),
                review_interval_years: 3,
            },
            3,
            "admin",
        )
    }

    #[test]
    fn new_assessment_starts_in_draft() {
        let a = draft();
        assert_eq!(a.status, ReviewStatus::Draft);
        assert_eq!(a.current_cycle, 0);
        assert!(a.next_review_date.is_none());
        assert!(a.last_review_date.is_none());
    }

    #[test]
    fn last_closed_cycle_by_status() {
        let mut a = draft();
        assert_eq!(a.last_closed_cycle(), None);

        a.status = ReviewStatus::UnderReview;
        a.current_cycle = 1;
        assert_eq!(a.last_closed_cycle(), None);

        a.status = ReviewStatus::Approved;
        assert_eq!(a.last_closed_cycle(), Some(1));

        a.status = ReviewStatus::UnderReview;
        a.current_cycle = 2;
        assert_eq!(a.last_closed_cycle(), Some(1));
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            ReviewStatus::Draft,
            ReviewStatus::UnderReview,
            ReviewStatus::Approved,
        ] {
            assert_eq!(ReviewStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ReviewStatus::parse("archived"), None);
    }
}
