use serde::{Deserialize, Serialize};

/// Top-level vestry configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VestryConfig {
    pub global: GlobalConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub instance_id: String,
    /// SQLite database path, e.g. "sqlite://vestry.db".
    pub database_url: String,
}

/// Review-lifecycle policy. `minimum_approvals_required` is read once per
/// assessment at creation time; `review_lookahead_days` is read by the
/// reconciler on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_minimum_approvals")]
    pub minimum_approvals_required: u32,
    #[serde(default = "default_lookahead_days")]
    pub review_lookahead_days: u32,
    /// Reminder category the reconciler files reminders under, by name.
    #[serde(default = "default_reminder_category")]
    pub reminder_category: String,
    #[serde(default)]
    pub default_reminder_assignee: Option<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            minimum_approvals_required: default_minimum_approvals(),
            review_lookahead_days: default_lookahead_days(),
            reminder_category: default_reminder_category(),
            default_reminder_assignee: None,
        }
    }
}

fn default_minimum_approvals() -> u32 {
    3
}

fn default_lookahead_days() -> u32 {
    60
}

fn default_reminder_category() -> String {
    "Risk Assessments".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
    /// Six-field cron expression; daily at 06:00 by default.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    /// Upper bound on any single assessment's reminder write.
    #[serde(default = "default_per_assessment_timeout_secs")]
    pub per_assessment_timeout_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            run_on_startup: default_true(),
            schedule: default_schedule(),
            per_assessment_timeout_secs: default_per_assessment_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_schedule() -> String {
    "0 0 6 * * *".into()
}

fn default_per_assessment_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg: VestryConfig = toml::from_str(
            r#"
            [global]
            instance_id = "parish-01"
            database_url = "sqlite://vestry.db"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.review.minimum_approvals_required, 3);
        assert_eq!(cfg.review.review_lookahead_days, 60);
        assert_eq!(cfg.review.reminder_category, "Risk Assessments");
        assert!(cfg.reconciler.run_on_startup);
        assert_eq!(cfg.reconciler.schedule, "0 0 6 * * *");
    }

    #[test]
    fn unknown_top_level_keys_are_rejected() {
        let result: Result<VestryConfig, _> = toml::from_str(
            r#"
            [global]
            instance_id = "parish-01"
            database_url = "sqlite://vestry.db"

            [revieww]
            minimum_approvals_required = 2
            "#,
        );
        assert!(result.is_err());
    }
}
