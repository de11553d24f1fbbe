use std::path::Path;

use anyhow::{Context, Result};

use vestry_core::config::VestryConfig;

/// Load and deserialize config from a TOML file.
pub fn load_config(path: &Path) -> Result<VestryConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    let config: VestryConfig =
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))?;
    Ok(config)
}

/// Validate config for internal consistency before anything is wired up.
pub fn validate_config(config: &VestryConfig) -> Result<()> {
    if config.global.database_url.is_empty() {
        anyhow::bail!("global.database_url must not be empty");
    }

    if config.review.minimum_approvals_required == 0 {
        anyhow::bail!("review.minimum_approvals_required must be at least 1");
    }

    if config.review.reminder_category.trim().is_empty() {
        anyhow::bail!("review.reminder_category must not be empty");
    }

    // Six-field cron expression (seconds through day-of-week).
    let fields = config.reconciler.schedule.split_whitespace().count();
    if fields != 6 {
        anyhow::bail!(
            "reconciler.schedule '{}' must have 6 cron fields, found {}",
            config.reconciler.schedule,
            fields
        );
    }

    if config.reconciler.per_assessment_timeout_secs == 0 {
        anyhow::bail!("reconciler.per_assessment_timeout_secs must be at least 1");
    }

    Ok(())
}
