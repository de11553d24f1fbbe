use std::sync::Arc;

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use vestry_core::config::ReconcilerConfig;

use crate::reconciler::DueReviewReconciler;

/// Runs the reconciler on a cron schedule, single-flight: a fire that
/// arrives while the previous run is still in progress is skipped, never
/// stacked.
pub struct ReconcilerSchedule {
    scheduler: Option<JobScheduler>,
}

impl ReconcilerSchedule {
    pub async fn start(
        reconciler: Arc<DueReviewReconciler>,
        config: &ReconcilerConfig,
    ) -> Result<Self, ScheduleError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| ScheduleError::SchedulerInit(e.to_string()))?;

        let gate = Arc::new(tokio::sync::Mutex::new(()));
        let schedule = config.schedule.clone();

        let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
            let reconciler = reconciler.clone();
            let gate = gate.clone();

            Box::pin(async move {
                let Ok(_guard) = gate.try_lock() else {
                    warn!("previous reconciler run still in progress, skipping this fire");
                    return;
                };
                let today = Utc::now().date_naive();
                let summary = reconciler.run(today).await;
                info!(
                    scanned = summary.scanned,
                    upserted = summary.upserted,
                    skipped = summary.skipped,
                    "scheduled reconciler run finished"
                );
            })
        })
        .map_err(|e| ScheduleError::JobCreate(schedule.clone(), e.to_string()))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| ScheduleError::JobAdd(e.to_string()))?;
        scheduler
            .start()
            .await
            .map_err(|e| ScheduleError::SchedulerStart(e.to_string()))?;

        info!(schedule = %config.schedule, "due-review reconciler scheduled");
        Ok(Self {
            scheduler: Some(scheduler),
        })
    }

    /// Gracefully stop the schedule.
    pub async fn shutdown(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            if let Err(e) = scheduler.shutdown().await {
                error!(error = %e, "error shutting down reconciler schedule");
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("scheduler init failed: {0}")]
    SchedulerInit(String),
    #[error("scheduler start failed: {0}")]
    SchedulerStart(String),
    #[error("job create failed for schedule '{0}': {1}")]
    JobCreate(String, String),
    #[error("job add failed: {0}")]
    JobAdd(String),
}
