//! Minute tick loop that fires status batches at fixed civil hours.
//!
//! The loop never runs two batches at once: a batch is spawned off the tick task and the
//! next window is skipped while it is still running. Delivery failures surface from
//! [`Scheduler::run`] and are handled by [`Supervisor`], which backs off and restarts the
//! loop, re-sending the failed batch first.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{
    DateTime, Datelike as _, FixedOffset, NaiveDate, Offset as _, Timelike as _, Utc, Weekday,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::app::notifier::Notifier;
use crate::error::DeliveryError;
use crate::message;
use crate::status::{Lookahead, StatusAggregator};

pub const TICK_PERIOD: Duration = Duration::from_secs(60);
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = -5;
pub const DEFAULT_TRIGGER_HOURS: [u32; 2] = [6, 18];
pub const DEFAULT_WEEKLY_HOUR: u32 = 18;
pub const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_secs(60);
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(3600);

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One eligible trigger window, identified by its civil date and hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub date: NaiveDate,
    pub hour: u32,
    pub weekly: bool,
}

impl Trigger {
    fn window(&self) -> (NaiveDate, u32) {
        (self.date, self.hour)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerGate {
    offset: FixedOffset,
    hours: Vec<u32>,
    weekly_day: Weekday,
    weekly_hour: u32,
}

impl Default for TriggerGate {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_HOURS * 3600)
                .unwrap_or_else(|| Utc.fix()),
            hours: DEFAULT_TRIGGER_HOURS.to_vec(),
            weekly_day: Weekday::Sun,
            weekly_hour: DEFAULT_WEEKLY_HOUR,
        }
    }
}

impl TriggerGate {
    pub fn new(
        utc_offset_hours: i32,
        hours: Vec<u32>,
        weekly_day: Weekday,
        weekly_hour: u32,
    ) -> anyhow::Result<Self> {
        let offset = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("utc offset out of range: {utc_offset_hours} hours"))?;
        if hours.is_empty() {
            anyhow::bail!("at least one trigger hour is required");
        }
        if let Some(bad) = hours.iter().find(|h| **h > 23) {
            anyhow::bail!("trigger hour out of range: {bad}");
        }
        if !hours.contains(&weekly_hour) {
            anyhow::bail!("weekly hour {weekly_hour} is not one of the trigger hours {hours:?}");
        }
        let mut hours = hours;
        hours.sort_unstable();
        hours.dedup();
        Ok(Self {
            offset,
            hours,
            weekly_day,
            weekly_hour,
        })
    }

    pub fn civil_time(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.offset)
    }

    /// Civil date at `now`, used as "today" by one-off checks.
    pub fn civil_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.civil_time(now).date_naive()
    }

    /// The window containing `now`, if `now` falls in minute zero of a trigger hour.
    pub fn trigger_at(&self, now: DateTime<Utc>) -> Option<Trigger> {
        let civil = self.civil_time(now);
        if civil.minute() != 0 || !self.hours.contains(&civil.hour()) {
            return None;
        }
        Some(Trigger {
            date: civil.date_naive(),
            hour: civil.hour(),
            weekly: civil.hour() == self.weekly_hour && civil.weekday() == self.weekly_day,
        })
    }
}

/// Consecutive-failure backoff: `initial * 2^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: DEFAULT_BACKOFF_INITIAL,
            max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.initial.checked_mul(factor))
            .unwrap_or(self.max)
            .min(self.max)
    }
}

/// What the supervisor does with a non-rate-limit delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalPolicy {
    #[default]
    Retry,
    Exit,
}

impl FatalPolicy {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "retry" => Ok(Self::Retry),
            "exit" => Ok(Self::Exit),
            other => anyhow::bail!("unsupported fatal policy: {other}"),
        }
    }
}

/// Builds the status report for a trigger and delivers it message by message.
pub struct BatchRunner {
    aggregator: StatusAggregator,
    notifier: Arc<dyn Notifier>,
    lookahead: Lookahead,
}

impl BatchRunner {
    pub fn new(
        aggregator: StatusAggregator,
        notifier: Arc<dyn Notifier>,
        lookahead: Lookahead,
    ) -> Self {
        Self {
            aggregator,
            notifier,
            lookahead,
        }
    }

    /// Returns the number of messages delivered. A report that cannot be built (store
    /// failure) is logged and yields zero messages.
    pub async fn run_batch(&self, trigger: Trigger) -> Result<usize, DeliveryError> {
        let report = match self.aggregator.report(trigger.date, self.lookahead).await {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(?err, date = %trigger.date, "cannot build status report; batch skipped");
                return Ok(0);
            }
        };

        let messages = message::batch(&report, trigger.weekly);
        for text in &messages {
            self.notifier.send(text).await?;
        }
        Ok(messages.len())
    }
}

type BatchHandle = JoinHandle<Result<usize, DeliveryError>>;

pub struct Scheduler {
    gate: TriggerGate,
    clock: Arc<dyn Clock>,
    runner: Arc<BatchRunner>,
    last_window: Option<(NaiveDate, u32)>,
    in_flight: Option<(Trigger, BatchHandle)>,
    retry: Option<Trigger>,
    delivered_batches: u64,
}

impl Scheduler {
    pub fn new(gate: TriggerGate, clock: Arc<dyn Clock>, runner: Arc<BatchRunner>) -> Self {
        Self {
            gate,
            clock,
            runner,
            last_window: None,
            in_flight: None,
            retry: None,
            delivered_batches: 0,
        }
    }

    pub fn delivered_batches(&self) -> u64 {
        self.delivered_batches
    }

    /// Applies the gate and the per-window dedupe. A returned trigger consumes its window.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<Trigger> {
        let trigger = self.gate.trigger_at(now)?;
        if self.last_window == Some(trigger.window()) {
            return None;
        }
        self.last_window = Some(trigger.window());
        Some(trigger)
    }

    /// One timer tick: collects a finished batch, then fires the current window if any.
    pub async fn tick(&mut self) -> Result<(), DeliveryError> {
        self.reap(false).await?;

        let Some(trigger) = self.poll(self.clock.now_utc()) else {
            return Ok(());
        };
        if let Some((running, _)) = &self.in_flight {
            tracing::warn!(
                date = %trigger.date,
                hour = trigger.hour,
                running_date = %running.date,
                running_hour = running.hour,
                "previous batch still running; window skipped"
            );
            return Ok(());
        }
        self.spawn(trigger);
        Ok(())
    }

    /// Waits for the running batch, if any, and reports its outcome.
    pub async fn finish_in_flight(&mut self) -> Result<(), DeliveryError> {
        self.reap(true).await
    }

    /// Ticks every minute until a batch fails. A batch that failed before is re-sent first.
    pub async fn run(&mut self) -> Result<Infallible, DeliveryError> {
        if let Some(trigger) = self.retry.take() {
            tracing::info!(date = %trigger.date, hour = trigger.hour, "re-sending failed batch");
            self.spawn(trigger);
        }

        let mut interval = tokio::time::interval(TICK_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            self.tick().await?;
        }
    }

    fn spawn(&mut self, trigger: Trigger) {
        tracing::info!(
            date = %trigger.date,
            hour = trigger.hour,
            weekly = trigger.weekly,
            "firing status batch"
        );
        let runner = Arc::clone(&self.runner);
        let handle = tokio::spawn(async move { runner.run_batch(trigger).await });
        self.in_flight = Some((trigger, handle));
    }

    async fn reap(&mut self, wait: bool) -> Result<(), DeliveryError> {
        let ready = self
            .in_flight
            .as_ref()
            .is_some_and(|(_, handle)| wait || handle.is_finished());
        if !ready {
            return Ok(());
        }
        let Some((trigger, handle)) = self.in_flight.take() else {
            return Ok(());
        };

        match handle.await {
            Ok(Ok(messages)) => {
                self.delivered_batches += 1;
                tracing::info!(date = %trigger.date, hour = trigger.hour, messages, "batch delivered");
                Ok(())
            }
            Ok(Err(err)) => {
                self.retry = Some(trigger);
                Err(err)
            }
            Err(err) => Err(DeliveryError::fatal(
                anyhow::Error::new(err).context("status batch task failed"),
            )),
        }
    }
}

/// Restarts the scheduler after delivery failures, with exponential backoff.
pub struct Supervisor {
    scheduler: Scheduler,
    retry: RetryPolicy,
    on_fatal: FatalPolicy,
}

impl Supervisor {
    pub fn new(scheduler: Scheduler, retry: RetryPolicy, on_fatal: FatalPolicy) -> Self {
        Self {
            scheduler,
            retry,
            on_fatal,
        }
    }

    /// Runs until a fatal failure under [`FatalPolicy::Exit`].
    pub async fn run(mut self) -> anyhow::Result<Infallible> {
        let mut attempt: u32 = 0;
        let mut delivered = self.scheduler.delivered_batches();

        loop {
            let err = match self.scheduler.run().await {
                Ok(never) => match never {},
                Err(err) => err,
            };

            if self.scheduler.delivered_batches() > delivered {
                delivered = self.scheduler.delivered_batches();
                attempt = 0;
            }

            let mut delay = self.retry.delay_for(attempt);
            match err {
                DeliveryError::RateLimited { retry_after } => {
                    if let Some(retry_after) = retry_after {
                        delay = delay.max(retry_after).min(self.retry.max);
                    }
                    tracing::warn!(
                        kind = "rate_limited",
                        attempt,
                        delay_secs = delay.as_secs(),
                        "notifier rate limited; backing off"
                    );
                }
                fatal @ DeliveryError::Fatal(_) => {
                    tracing::error!(kind = fatal.kind(), err = %fatal, attempt, "status batch delivery failed");
                    if self.on_fatal == FatalPolicy::Exit {
                        return Err(anyhow::Error::new(fatal).context("scheduler stopped"));
                    }
                    tracing::warn!(delay_secs = delay.as_secs(), "restarting scheduler after backoff");
                }
            }

            attempt = attempt.saturating_add(1);
            tokio::time::sleep(delay).await;
        }
    }
}
