mod config;
mod shutdown;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::watch;
use tracing::info;

use vestry_reconciler::{DueReviewReconciler, ReconcilerSchedule};
use vestry_store::SqliteStore;

/// Vestry daemon — runs the due-review reminder reconciliation for the
/// church-administration database.
#[derive(Parser, Debug)]
#[command(name = "vestryd", version, about)]
struct Cli {
    /// Config file path.
    #[arg(short, long, default_value = "vestry.toml")]
    config: PathBuf,

    /// Increase log verbosity (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Validate config and exit.
    #[arg(long)]
    validate: bool,

    /// Run a single reconciliation pass and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 1. Load and validate config
    // -----------------------------------------------------------------------
    let config = config::load_config(&cli.config)?;
    config::validate_config(&config)?;

    if cli.validate {
        println!("config is valid");
        return Ok(());
    }

    // -----------------------------------------------------------------------
    // 2. Initialize tracing
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cli.verbose)?;
    info!(instance_id = %config.global.instance_id, "vestryd starting");

    // -----------------------------------------------------------------------
    // 3. Open the database and build the reconciler
    // -----------------------------------------------------------------------
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.global.database_url)
        .await
        .with_context(|| format!("opening database {}", config.global.database_url))?;
    let store = Arc::new(
        SqliteStore::new(pool)
            .await
            .context("running store migrations")?,
    );

    let reconciler = Arc::new(DueReviewReconciler::new(
        store.clone(),
        store.clone(),
        config.review.clone(),
        Duration::from_secs(config.reconciler.per_assessment_timeout_secs),
    ));

    if cli.once {
        let summary = reconciler.run(Utc::now().date_naive()).await;
        info!(
            scanned = summary.scanned,
            upserted = summary.upserted,
            skipped = summary.skipped,
            "single reconciliation pass complete"
        );
        return Ok(());
    }

    // -----------------------------------------------------------------------
    // 4. Startup run and cron schedule
    // -----------------------------------------------------------------------
    if config.reconciler.run_on_startup {
        reconciler.run(Utc::now().date_naive()).await;
    }

    let mut schedule = ReconcilerSchedule::start(reconciler, &config.reconciler)
        .await
        .context("starting reconciler schedule")?;

    // -----------------------------------------------------------------------
    // 5. Wait for shutdown
    // -----------------------------------------------------------------------
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(shutdown::signal_listener(shutdown_tx));

    while !*shutdown_rx.borrow() {
        if shutdown_rx.changed().await.is_err() {
            break;
        }
    }

    schedule.shutdown().await;
    info!("vestryd stopped");
    Ok(())
}
