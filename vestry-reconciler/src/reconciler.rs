use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

use vestry_core::config::ReviewConfig;
use vestry_core::error::VestryError;
use vestry_core::reminder::{reminder_key, ReminderSink, ReminderUpsert};
use vestry_core::store::AssessmentStore;
use vestry_review::schedule;

/// Idempotent synchronization between due assessments and the reminder
/// module.
///
/// Each run reads assessment state and writes only through the reminder
/// sink's keyed upsert, so repeated runs against unchanged data converge on
/// one reminder per (assessment, cycle). A single assessment's failure is
/// logged and skipped; it never aborts the scan or the host process.
pub struct DueReviewReconciler {
    assessments: Arc<dyn AssessmentStore>,
    reminders: Arc<dyn ReminderSink>,
    policy: ReviewConfig,
    per_assessment_timeout: Duration,
}

/// Counts from one reconciler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scanned: usize,
    pub upserted: usize,
    pub skipped: usize,
}

impl DueReviewReconciler {
    pub fn new(
        assessments: Arc<dyn AssessmentStore>,
        reminders: Arc<dyn ReminderSink>,
        policy: ReviewConfig,
        per_assessment_timeout: Duration,
    ) -> Self {
        Self {
            assessments,
            reminders,
            policy,
            per_assessment_timeout,
        }
    }

    /// One full scan. Infallible by design: every failure mode is logged
    /// and reflected in the summary instead of propagated.
    #[instrument(skip(self))]
    pub async fn run(&self, today: NaiveDate) -> RunSummary {
        let mut summary = RunSummary::default();

        let category_id = match self
            .reminders
            .category_id_by_name(&self.policy.reminder_category)
            .await
        {
            Ok(Some(id)) => id,
            Ok(None) => {
                let err = VestryError::Configuration(format!(
                    "reminder category '{}' does not exist",
                    self.policy.reminder_category
                ));
                error!(error = %err, "skipping reconciler run");
                return summary;
            }
            Err(e) => {
                error!(error = %e, "reminder category lookup failed, skipping reconciler run");
                return summary;
            }
        };

        let cutoff = schedule::due_cutoff(today, self.policy.review_lookahead_days);
        let due = match self.assessments.list_due(cutoff).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "due-assessment query failed, skipping reconciler run");
                return summary;
            }
        };

        for assessment in due {
            summary.scanned += 1;

            // list_due only returns rows with a due date set.
            let Some(due_date) = assessment.next_review_date else {
                continue;
            };
            let overdue = schedule::is_overdue(&assessment, today);
            let upsert = ReminderUpsert {
                key: reminder_key(assessment.id, assessment.current_cycle),
                description: format!("Review risk assessment: {}", assessment.title),
                due_date,
                priority: overdue,
                category_id,
                assignee: self.policy.default_reminder_assignee.clone(),
            };

            match tokio::time::timeout(self.per_assessment_timeout, self.reminders.upsert(upsert))
                .await
            {
                Ok(Ok(())) => summary.upserted += 1,
                Ok(Err(e)) => {
                    warn!(
                        assessment_id = %assessment.id,
                        error = %e,
                        "reminder upsert failed, continuing scan"
                    );
                    summary.skipped += 1;
                }
                Err(_) => {
                    warn!(
                        assessment_id = %assessment.id,
                        timeout = ?self.per_assessment_timeout,
                        "reminder upsert timed out, continuing scan"
                    );
                    summary.skipped += 1;
                }
            }
        }

        info!(
            scanned = summary.scanned,
            upserted = summary.upserted,
            skipped = summary.skipped,
            "due-review reconciliation complete"
        );
        summary
    }
}
