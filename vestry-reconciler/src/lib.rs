//! The due-review reconciliation job: scans for approved assessments
//! approaching or past their next review date and keeps exactly one
//! reminder per (assessment, cycle) in the reminder module, plus the cron
//! wrapper that runs the scan on a schedule.

pub mod cron;
pub mod reconciler;

pub use cron::{ReconcilerSchedule, ScheduleError};
pub use reconciler::{DueReviewReconciler, RunSummary};
