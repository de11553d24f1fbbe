use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, instrument};

use vestry_core::approval::{ApprovalOutcome, ApprovalRecord};
use vestry_core::assessment::{
    AssessmentId, AssessmentPatch, NewAssessment, ReviewStatus, RiskAssessment,
};
use vestry_core::category::CategoryId;
use vestry_core::config::ReviewConfig;
use vestry_core::directory::{MemberDirectory, MemberId};
use vestry_core::error::VestryError;
use vestry_core::store::{ApprovalStore, AssessmentFilter, AssessmentStore, CategoryStore};
use vestry_core::view::{AssessmentHistory, AssessmentView};

use crate::history;
use crate::locks::AssessmentLocks;
use crate::schedule;

/// Gatekeeper for the review-cycle state machine.
///
/// The single writer of `status`, `current_cycle`, `last_review_date` and
/// `next_review_date`. Mutating operations are serialized per assessment and
/// written back under an optimistic version check; a lost check re-runs the
/// whole operation once before surfacing `Conflict`.
pub struct ReviewService {
    assessments: Arc<dyn AssessmentStore>,
    approvals: Arc<dyn ApprovalStore>,
    categories: Arc<dyn CategoryStore>,
    directory: Arc<dyn MemberDirectory>,
    policy: ReviewConfig,
    locks: AssessmentLocks,
}

impl ReviewService {
    pub fn new(
        assessments: Arc<dyn AssessmentStore>,
        approvals: Arc<dyn ApprovalStore>,
        categories: Arc<dyn CategoryStore>,
        directory: Arc<dyn MemberDirectory>,
        policy: ReviewConfig,
    ) -> Self {
        Self {
            assessments,
            approvals,
            categories,
            directory,
            policy,
            locks: AssessmentLocks::new(),
        }
    }

    /// Create an assessment in Draft. The quorum is captured from the
    /// current policy so later configuration changes leave this assessment
    /// untouched.
    #[instrument(skip(self, new), fields(title = %new.title))]
    pub async fn create_assessment(
        &self,
        new: NewAssessment,
        actor: &str,
    ) -> Result<AssessmentView, VestryError> {
        validate_interval(new.review_interval_years)?;
        let category = self
            .categories
            .get(new.category_id)
            .await?
            .ok_or(VestryError::CategoryNotFound(new.category_id))?;

        let assessment = RiskAssessment::new(
            category.id,
            new,
            self.policy.minimum_approvals_required,
            actor,
        );
        self.assessments.insert(&assessment).await?;

        info!(assessment_id = %assessment.id, "assessment created");
        Ok(self.view_of(assessment, category.name, Utc::now().date_naive()))
    }

    /// Open a review cycle: Draft or Approved becomes UnderReview and the
    /// cycle number advances. A cycle already in progress is an error, never
    /// nested.
    #[instrument(skip(self))]
    pub async fn start_review(
        &self,
        id: AssessmentId,
        actor: &str,
    ) -> Result<AssessmentView, VestryError> {
        let lock = self.locks.for_assessment(id);
        let _guard = lock.lock().await;

        for attempt in 0..2 {
            let mut assessment = self.load(id).await?;
            if assessment.status == ReviewStatus::UnderReview {
                return Err(VestryError::invalid_state(
                    "a review is already in progress for this assessment",
                ));
            }

            assessment.current_cycle += 1;
            assessment.status = ReviewStatus::UnderReview;
            assessment.touch(actor);

            if self.store_guarded(&mut assessment).await? {
                info!(
                    assessment_id = %id,
                    cycle = assessment.current_cycle,
                    "review cycle opened"
                );
                return Ok(self.view_with_lookups(assessment).await?);
            }
            debug!(assessment_id = %id, attempt, "version check lost, reloading");
        }
        Err(VestryError::Conflict(id))
    }

    /// Record one submission of approvals against the open cycle.
    ///
    /// The submission must carry at least two distinct members, each an
    /// active deacon. Approvers already counted this cycle are ignored, so
    /// client retries converge. Reaching quorum closes the cycle and stamps
    /// the next due date within the same guarded operation.
    ///
    /// State is checked before the submission is validated: a submission
    /// against a Draft or already-closed assessment reports the state
    /// problem, whatever shape the approver set is in.
    #[instrument(skip(self, approvers, notes), fields(submitted = approvers.len()))]
    pub async fn record_approval(
        &self,
        id: AssessmentId,
        approvers: &[MemberId],
        notes: &str,
        actor: &str,
    ) -> Result<ApprovalOutcome, VestryError> {
        let submitted: BTreeSet<MemberId> = approvers.iter().copied().collect();

        let lock = self.locks.for_assessment(id);
        let _guard = lock.lock().await;

        for attempt in 0..2 {
            match self.try_record_approval(id, &submitted, notes, actor).await {
                Err(VestryError::Conflict(_)) if attempt == 0 => {
                    debug!(assessment_id = %id, "approval transition lost version check, retrying");
                }
                other => return other,
            }
        }
        Err(VestryError::Conflict(id))
    }

    async fn try_record_approval(
        &self,
        id: AssessmentId,
        submitted: &BTreeSet<MemberId>,
        notes: &str,
        actor: &str,
    ) -> Result<ApprovalOutcome, VestryError> {
        let mut assessment = self.load(id).await?;
        if assessment.status != ReviewStatus::UnderReview {
            return Err(VestryError::invalid_state(
                "start a review before approving",
            ));
        }

        if submitted.len() < 2 {
            return Err(VestryError::validation(
                "an approval submission requires at least two distinct approvers",
            ));
        }
        for member in submitted {
            if !self.directory.is_active_deacon(*member).await? {
                return Err(VestryError::Validation(format!(
                    "member {member} is not an active deacon"
                )));
            }
        }

        let cycle = assessment.current_cycle;
        let existing: BTreeSet<MemberId> = self
            .approvals
            .approvers_for_cycle(id, cycle)
            .await?
            .into_iter()
            .collect();

        let today = Utc::now().date_naive();
        let mut recorded = false;
        for member in submitted {
            if existing.contains(member) {
                debug!(assessment_id = %id, approver = %member, "approver already counted this cycle");
                continue;
            }
            let record = ApprovalRecord::new(id, cycle, *member, today, notes.to_string());
            match self.approvals.append(&record).await {
                Ok(()) => recorded = true,
                // Unique-key loss against an out-of-process writer; the
                // approver is counted either way.
                Err(VestryError::Validation(_)) => {
                    debug!(assessment_id = %id, approver = %member, "approval already written concurrently");
                }
                Err(e) => return Err(e),
            }
        }

        let total = self.approvals.count_distinct_approvers(id, cycle).await?;
        let mut approved = false;
        if total >= assessment.minimum_approvals {
            let next = schedule::next_due_date(today, assessment.review_interval_years)
                .ok_or_else(|| {
                    VestryError::validation("next review date falls outside the calendar range")
                })?;
            assessment.status = ReviewStatus::Approved;
            assessment.last_review_date = Some(today);
            assessment.next_review_date = Some(next);
            assessment.touch(actor);

            if !self.store_guarded(&mut assessment).await? {
                return Err(VestryError::Conflict(id));
            }
            approved = true;
            info!(
                assessment_id = %id,
                cycle,
                approvals = total,
                next_review = %next,
                "quorum reached, review cycle closed"
            );
        } else {
            info!(
                assessment_id = %id,
                cycle,
                approvals = total,
                required = assessment.minimum_approvals,
                "approval recorded, quorum not yet reached"
            );
        }

        Ok(ApprovalOutcome {
            approval_recorded: recorded,
            total_approvals: total,
            minimum_required: assessment.minimum_approvals,
            assessment_approved: approved,
            next_review_date: assessment.next_review_date,
        })
    }

    /// Edit descriptive metadata in any status. A changed interval affects
    /// only the date computed at the next cycle closure; an already stamped
    /// `next_review_date` keeps pointing where downstream reminders expect.
    #[instrument(skip(self, patch))]
    pub async fn update_metadata(
        &self,
        id: AssessmentId,
        patch: AssessmentPatch,
        actor: &str,
    ) -> Result<AssessmentView, VestryError> {
        validate_interval(patch.review_interval_years)?;

        let lock = self.locks.for_assessment(id);
        let _guard = lock.lock().await;

        for attempt in 0..2 {
            let mut assessment = self.load(id).await?;
            assessment.title = patch.title.clone();
            assessment.description = patch.description.clone();
            assessment.scope = patch.scope.clone();
            assessment.notes = patch.notes.clone();
            assessment.review_interval_years = patch.review_interval_years;
            assessment.touch(actor);

            if self.store_guarded(&mut assessment).await? {
                info!(assessment_id = %id, "assessment metadata updated");
                return Ok(self.view_with_lookups(assessment).await?);
            }
            debug!(assessment_id = %id, attempt, "version check lost, reloading");
        }
        Err(VestryError::Conflict(id))
    }

    pub async fn get(&self, id: AssessmentId) -> Result<AssessmentView, VestryError> {
        let assessment = self.load(id).await?;
        self.view_with_lookups(assessment).await
    }

    /// List assessments with optional category/status/title filters;
    /// `overdue_only` is applied here against the derived alert facts.
    pub async fn list(
        &self,
        filter: AssessmentFilter,
        overdue_only: bool,
    ) -> Result<Vec<AssessmentView>, VestryError> {
        let today = Utc::now().date_naive();
        let mut category_names: HashMap<CategoryId, String> = HashMap::new();
        let mut views = Vec::new();

        for assessment in self.assessments.list(&filter).await? {
            if overdue_only && !schedule::is_overdue(&assessment, today) {
                continue;
            }
            let name = match category_names.get(&assessment.category_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.category_name(assessment.category_id).await?;
                    category_names.insert(assessment.category_id, name.clone());
                    name
                }
            };
            let count = self.current_cycle_count(&assessment).await?;
            let mut view = self.view_of(assessment, name, today);
            view.approval_count = count;
            views.push(view);
        }
        Ok(views)
    }

    /// Full cycle history for audit display, most recent cycle first.
    pub async fn history(&self, id: AssessmentId) -> Result<AssessmentHistory, VestryError> {
        let assessment = self.load(id).await?;
        let records = self.approvals.for_assessment(id).await?;
        let category_name = self.category_name(assessment.category_id).await?;
        Ok(AssessmentHistory {
            assessment_id: assessment.id,
            title: assessment.title.clone(),
            category_name,
            cycles: history::reconstruct(&assessment, &records),
        })
    }

    async fn load(&self, id: AssessmentId) -> Result<RiskAssessment, VestryError> {
        self.assessments
            .get(id)
            .await?
            .ok_or(VestryError::AssessmentNotFound(id))
    }

    /// Bump the version and write back under the optimistic guard. Returns
    /// false when a concurrent writer got there first.
    async fn store_guarded(&self, assessment: &mut RiskAssessment) -> Result<bool, VestryError> {
        let expected = assessment.version;
        assessment.version = expected + 1;
        self.assessments
            .update_versioned(assessment, expected)
            .await
    }

    async fn category_name(&self, id: CategoryId) -> Result<String, VestryError> {
        Ok(self
            .categories
            .get(id)
            .await?
            .map(|c| c.name)
            .unwrap_or_default())
    }

    async fn current_cycle_count(&self, assessment: &RiskAssessment) -> Result<u32, VestryError> {
        if assessment.current_cycle == 0 {
            return Ok(0);
        }
        self.approvals
            .count_distinct_approvers(assessment.id, assessment.current_cycle)
            .await
    }

    async fn view_with_lookups(
        &self,
        assessment: RiskAssessment,
    ) -> Result<AssessmentView, VestryError> {
        let name = self.category_name(assessment.category_id).await?;
        let count = self.current_cycle_count(&assessment).await?;
        let mut view = self.view_of(assessment, name, Utc::now().date_naive());
        view.approval_count = count;
        Ok(view)
    }

    fn view_of(
        &self,
        assessment: RiskAssessment,
        category_name: String,
        today: NaiveDate,
    ) -> AssessmentView {
        let is_overdue = schedule::is_overdue(&assessment, today);
        let alert = schedule::alert_status(&assessment, today);
        AssessmentView::from_parts(assessment, category_name, 0, is_overdue, alert)
    }
}

fn validate_interval(years: u8) -> Result<(), VestryError> {
    if !(1..=5).contains(&years) {
        return Err(VestryError::Validation(format!(
            "review interval must be between 1 and 5 years, got {years}"
        )));
    }
    Ok(())
}
