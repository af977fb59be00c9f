//! Wiring of the scheduler and one-off batches from [`Config`].

use std::sync::Arc;

use anyhow::Context as _;
use chrono::Timelike as _;

use crate::app::notifier::{DiscordNotifier, Notifier, StdoutNotifier};
use crate::cli::{CheckArgs, RunArgs};
use crate::config::Config;
use crate::deadline::parse_due_date;
use crate::scheduler::{BatchRunner, Clock, Scheduler, Supervisor, SystemClock, Trigger};

fn notifier(config: &Config, dry_run: bool) -> anyhow::Result<Arc<dyn Notifier>> {
    if dry_run {
        return Ok(Arc::new(StdoutNotifier));
    }
    let discord =
        DiscordNotifier::new(config.require_discord()?).context("build discord notifier")?;
    Ok(Arc::new(discord))
}

fn runner(config: &Config, dry_run: bool) -> anyhow::Result<Arc<BatchRunner>> {
    Ok(Arc::new(BatchRunner::new(
        config.aggregator(),
        notifier(config, dry_run)?,
        config.lookahead,
    )))
}

/// Runs the scheduler until Ctrl-C, or until a fatal failure when configured to exit.
pub async fn run(config: &Config, args: RunArgs) -> anyhow::Result<()> {
    let scheduler = Scheduler::new(
        config.gate.clone(),
        Arc::new(SystemClock),
        runner(config, args.dry_run)?,
    );
    let supervisor = Supervisor::new(scheduler, config.retry, config.on_fatal);
    tracing::info!(
        data_dir = %config.data_dir.display(),
        sheets_dir = %config.sheets_dir.display(),
        dry_run = args.dry_run,
        "scheduler started"
    );

    tokio::select! {
        result = supervisor.run() => match result {
            Ok(never) => match never {},
            Err(err) => Err(err),
        },
        signal = tokio::signal::ctrl_c() => {
            signal.context("listen for ctrl-c")?;
            tracing::info!("interrupted; scheduler stopped");
            Ok(())
        }
    }
}

/// Builds and delivers one batch immediately, bypassing the trigger gate.
pub async fn check(config: &Config, args: CheckArgs) -> anyhow::Result<()> {
    let now = SystemClock.now_utc();
    let date = match args.date.as_deref() {
        Some(raw) => parse_due_date(raw)?,
        None => config.gate.civil_date(now),
    };
    let trigger = Trigger {
        date,
        hour: config.gate.civil_time(now).hour(),
        weekly: args.weekly,
    };

    let sent = runner(config, args.dry_run)?
        .run_batch(trigger)
        .await
        .context("deliver status batch")?;
    tracing::info!(date = %trigger.date, messages = sent, "batch delivered");
    Ok(())
}
