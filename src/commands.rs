//! Operator commands over the local stores and the status queries.
//!
//! Each public function takes raw operator arguments, validates them, resolves series
//! aliases and returns a typed result. [`execute`] maps a parsed CLI command onto them and
//! renders the printable output.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::app::store::{Exclusions, StateStore};
use crate::calendar::CalendarRule;
use crate::cli::{AliasCommand, CalendarCommand, Command, DeadlineCommand, StatusCommand};
use crate::deadline::{Deadline, DeadlineBook, Overdue, parse_due_date};
use crate::error::require_non_empty;
use crate::message;
use crate::status::{Lookahead, SeriesStatus, StatusAggregator};

/// Shared inputs of every command.
#[derive(Clone)]
pub struct Context {
    pub aggregator: StatusAggregator,
    /// Civil date used when a command takes no `--date`.
    pub today: NaiveDate,
    pub lookahead: Lookahead,
}

impl Context {
    pub fn store(&self) -> &StateStore {
        self.aggregator.store()
    }

    fn date_or_today(&self, raw: Option<&str>) -> anyhow::Result<NaiveDate> {
        match raw {
            Some(raw) => Ok(parse_due_date(raw)?),
            None => Ok(self.today),
        }
    }
}

/// Outcome of an idempotent set membership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toggle {
    pub series: String,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replaced<T> {
    pub key: String,
    pub value: T,
    pub previous: Option<T>,
}

async fn canonical_series(store: &StateStore, series: &str) -> anyhow::Result<String> {
    let series = require_non_empty("series", series)?;
    store.resolve(&series).await
}

pub async fn set_paused(store: &StateStore, series: &str, paused: bool) -> anyhow::Result<Toggle> {
    let series = canonical_series(store, series).await?;
    let changed = store.set_paused(&series, paused).await?;
    tracing::info!(series = %series, paused, changed, "updated pause list");
    Ok(Toggle { series, changed })
}

pub async fn set_solo(store: &StateStore, series: &str, solo: bool) -> anyhow::Result<Toggle> {
    let series = canonical_series(store, series).await?;
    let changed = store.set_solo(&series, solo).await?;
    tracing::info!(series = %series, solo, changed, "updated solo list");
    Ok(Toggle { series, changed })
}

pub async fn exclusions(store: &StateStore) -> anyhow::Result<Exclusions> {
    store.exclusions().await
}

/// `days` are weekday names or days of month, one per item or comma separated.
pub async fn set_rule(
    store: &StateStore,
    series: &str,
    days: &[String],
) -> anyhow::Result<Replaced<CalendarRule>> {
    let rule = CalendarRule::parse(&days.join(" "))?;
    let series = canonical_series(store, series).await?;
    let previous = store.set_rule(&series, rule.clone()).await?;
    tracing::info!(series = %series, %rule, "set calendar rule");
    Ok(Replaced {
        key: series,
        value: rule,
        previous,
    })
}

pub async fn remove_rule(
    store: &StateStore,
    series: &str,
) -> anyhow::Result<(String, Option<CalendarRule>)> {
    let series = canonical_series(store, series).await?;
    let previous = store.remove_rule(&series).await?;
    Ok((series, previous))
}

pub async fn rules(store: &StateStore) -> anyhow::Result<BTreeMap<String, CalendarRule>> {
    store.calendar().await
}

pub async fn publishing_on(
    aggregator: &StatusAggregator,
    date: NaiveDate,
) -> anyhow::Result<Vec<String>> {
    aggregator.publishing_on(date).await
}

/// Stores the due date normalized to `YYYY-MM-DD`.
pub async fn set_deadline(
    store: &StateStore,
    series: &str,
    chapter: &str,
    person: &str,
    due: &str,
) -> anyhow::Result<Replaced<Deadline>> {
    let chapter = require_non_empty("chapter", chapter)?;
    let person = require_non_empty("person", person)?;
    let due = parse_due_date(due)?;
    let series = canonical_series(store, series).await?;

    let deadline = Deadline {
        person,
        due: due.format("%Y-%m-%d").to_string(),
    };
    let previous = store
        .set_deadline(&series, &chapter, deadline.clone())
        .await?;
    tracing::info!(series = %series, chapter = %chapter, due = %deadline.due, "set deadline");
    Ok(Replaced {
        key: format!("{series} chapter {chapter}"),
        value: deadline,
        previous,
    })
}

pub async fn remove_deadline(
    store: &StateStore,
    series: &str,
    chapter: &str,
) -> anyhow::Result<(String, Option<Deadline>)> {
    let chapter = require_non_empty("chapter", chapter)?;
    let series = canonical_series(store, series).await?;
    let previous = store.remove_deadline(&series, &chapter).await?;
    Ok((format!("{series} chapter {chapter}"), previous))
}

pub async fn deadlines(store: &StateStore) -> anyhow::Result<DeadlineBook> {
    store.deadlines().await
}

pub async fn overdue(
    aggregator: &StatusAggregator,
    today: NaiveDate,
) -> anyhow::Result<Vec<Overdue>> {
    aggregator.overdue(today).await
}

pub async fn add_alias(
    store: &StateStore,
    short: &str,
    canonical: &str,
) -> anyhow::Result<Replaced<String>> {
    let short = require_non_empty("alias", short)?;
    let canonical = require_non_empty("series", canonical)?;
    let previous = store.set_alias(&short, &canonical).await?;
    tracing::info!(alias = %short, series = %canonical, "set alias");
    Ok(Replaced {
        key: short,
        value: canonical,
        previous,
    })
}

pub async fn remove_alias(store: &StateStore, short: &str) -> anyhow::Result<Option<String>> {
    let short = require_non_empty("alias", short)?;
    store.remove_alias(&short).await
}

pub async fn aliases(store: &StateStore) -> anyhow::Result<BTreeMap<String, String>> {
    store.aliases().await
}

pub async fn resolve(store: &StateStore, name: &str) -> anyhow::Result<String> {
    canonical_series(store, name).await
}

pub async fn series_status(
    aggregator: &StatusAggregator,
    series: &str,
) -> anyhow::Result<Option<SeriesStatus>> {
    let series = canonical_series(aggregator.store(), series).await?;
    aggregator.series_status(&series).await
}

/// Runs one store or status command and returns the text to print.
pub async fn execute(ctx: &Context, command: Command) -> anyhow::Result<String> {
    let store = ctx.store();
    match command {
        Command::Pause(args) => {
            let toggle = set_paused(store, &args.series, true).await?;
            Ok(render_toggle(&toggle, "Paused", "was already paused"))
        }
        Command::Unpause(args) => {
            let toggle = set_paused(store, &args.series, false).await?;
            Ok(render_toggle(&toggle, "Unpaused", "was not paused"))
        }
        Command::Solo(args) => {
            let toggle = set_solo(store, &args.series, true).await?;
            Ok(render_toggle(&toggle, "Marked solo:", "was already solo"))
        }
        Command::Unsolo(args) => {
            let toggle = set_solo(store, &args.series, false).await?;
            Ok(render_toggle(&toggle, "No longer solo:", "was not solo"))
        }
        Command::Exclusions => {
            let exclusions = exclusions(store).await?;
            Ok(format!(
                "Paused: {}\nSolo: {}",
                join_or_none(exclusions.paused.iter()),
                join_or_none(exclusions.solo.iter())
            ))
        }
        Command::Calendar { command } => calendar(ctx, command).await,
        Command::Deadline { command } => deadline(ctx, command).await,
        Command::Alias { command } => alias(store, command).await,
        Command::Status { command } => status(ctx, command).await,
        Command::Run(_) | Command::Check(_) => {
            anyhow::bail!("scheduler commands are not store or status commands")
        }
    }
}

async fn calendar(ctx: &Context, command: CalendarCommand) -> anyhow::Result<String> {
    let store = ctx.store();
    match command {
        CalendarCommand::Set { series, days } => {
            let change = set_rule(store, &series, &days).await?;
            let mut text = format!("{}: {}", change.key, change.value);
            if let Some(previous) = change.previous {
                text.push_str(&format!(" (was: {previous})"));
            }
            Ok(text)
        }
        CalendarCommand::Remove(args) => match remove_rule(store, &args.series).await? {
            (series, Some(previous)) => Ok(format!("Removed rule of {series} ({previous}).")),
            (series, None) => Ok(format!("{series} has no calendar rule.")),
        },
        CalendarCommand::List => {
            let rules = rules(store).await?;
            if rules.is_empty() {
                return Ok("No calendar rules.".to_owned());
            }
            Ok(rules
                .iter()
                .map(|(series, rule)| format!("{series}: {rule}"))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        CalendarCommand::On(args) => {
            let date = ctx.date_or_today(args.date.as_deref())?;
            let series = publishing_on(&ctx.aggregator, date).await?;
            let day = date.format("%A %Y-%m-%d");
            if series.is_empty() {
                return Ok(format!("Nothing publishes on {day}."));
            }
            Ok(format!("Publishing on {day}: {}", series.join(", ")))
        }
    }
}

async fn deadline(ctx: &Context, command: DeadlineCommand) -> anyhow::Result<String> {
    let store = ctx.store();
    match command {
        DeadlineCommand::Set {
            series,
            chapter,
            person,
            due,
        } => {
            let change = set_deadline(store, &series, &chapter, &person, &due).await?;
            let mut text = format!(
                "{}: {}, due {}",
                change.key, change.value.person, change.value.due
            );
            if let Some(previous) = change.previous {
                text.push_str(&format!(" (was: {}, due {})", previous.person, previous.due));
            }
            Ok(text)
        }
        DeadlineCommand::Remove { series, chapter } => {
            match remove_deadline(store, &series, &chapter).await? {
                (key, Some(_)) => Ok(format!("Removed deadline of {key}.")),
                (key, None) => Ok(format!("{key} has no deadline.")),
            }
        }
        DeadlineCommand::List => {
            let book = deadlines(store).await?;
            let lines: Vec<String> = book
                .iter()
                .flat_map(|(series, chapters)| {
                    chapters.iter().map(move |(chapter, deadline)| {
                        format!(
                            "{series} chapter {chapter}: {}, due {}",
                            deadline.person, deadline.due
                        )
                    })
                })
                .collect();
            if lines.is_empty() {
                return Ok("No deadlines.".to_owned());
            }
            Ok(lines.join("\n"))
        }
        DeadlineCommand::Overdue(args) => {
            let today = ctx.date_or_today(args.date.as_deref())?;
            let late = overdue(&ctx.aggregator, today).await?;
            Ok(message::overdue(&late).unwrap_or_else(|| "No overdue deadlines.".to_owned()))
        }
    }
}

async fn alias(store: &StateStore, command: AliasCommand) -> anyhow::Result<String> {
    match command {
        AliasCommand::Add { short, canonical } => {
            let change = add_alias(store, &short, &canonical).await?;
            let mut text = format!("{} -> {}", change.key, change.value);
            if let Some(previous) = change.previous {
                text.push_str(&format!(" (was: {previous})"));
            }
            Ok(text)
        }
        AliasCommand::Remove { short } => match remove_alias(store, &short).await? {
            Some(canonical) => Ok(format!("Removed alias {} -> {canonical}.", short.trim())),
            None => Ok(format!("No alias {}.", short.trim())),
        },
        AliasCommand::List => {
            let aliases = aliases(store).await?;
            if aliases.is_empty() {
                return Ok("No aliases.".to_owned());
            }
            Ok(aliases
                .iter()
                .map(|(short, canonical)| format!("{short} -> {canonical}"))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        AliasCommand::Resolve { name } => resolve(store, &name).await,
    }
}

async fn status(ctx: &Context, command: StatusCommand) -> anyhow::Result<String> {
    let aggregator = &ctx.aggregator;
    match command {
        StatusCommand::RawPending => {
            let gaps = aggregator.raw_pending_now().await?;
            Ok(message::raw_pending_now(&gaps))
        }
        StatusCommand::RawLookahead(args) => {
            let today = ctx.date_or_today(args.from.date.as_deref())?;
            let days = args.days.unwrap_or(ctx.lookahead.raw_days);
            let lookahead = aggregator.raw_pending_lookahead(today, days).await?;
            Ok(message::raw_pending_lookahead(&lookahead).unwrap_or_else(|| {
                format!(
                    "No RAW gaps for series publishing on {}.",
                    lookahead.date.format("%A %Y-%m-%d")
                )
            }))
        }
        StatusCommand::Assignments(args) => {
            let today = ctx.date_or_today(args.from.date.as_deref())?;
            let days = args.days.unwrap_or(ctx.lookahead.assignment_days);
            let lookahead = aggregator.assignment_gaps_lookahead(today, days).await?;
            Ok(message::assignment_gaps(&lookahead).unwrap_or_else(|| {
                format!(
                    "Every series publishing on {} is fully assigned.",
                    lookahead.date.format("%A %Y-%m-%d")
                )
            }))
        }
        StatusCommand::Ready => {
            let ready = aggregator.ready_to_publish().await?;
            Ok(message::ready_to_publish(ready.as_ref())
                .unwrap_or_else(|| "Nothing is ready to publish.".to_owned()))
        }
        StatusCommand::Series(args) => match series_status(aggregator, &args.series).await? {
            Some(status) => Ok(render_series_status(&status)),
            None => anyhow::bail!("cannot read the sheet of {}", args.series.trim()),
        },
        StatusCommand::Summary(args) => {
            let today = ctx.date_or_today(args.date.as_deref())?;
            let report = aggregator.report(today, ctx.lookahead).await?;
            Ok(message::weekly_summary(&report))
        }
    }
}

fn render_toggle(toggle: &Toggle, done: &str, unchanged: &str) -> String {
    if toggle.changed {
        format!("{done} {}.", toggle.series)
    } else {
        format!("{} {unchanged}.", toggle.series)
    }
}

fn render_series_status(status: &SeriesStatus) -> String {
    let mut lines = Vec::new();
    match &status.blocking {
        Some((chapter, flags)) => {
            let pending: Vec<String> = flags.pending().iter().map(|s| s.to_string()).collect();
            lines.push(format!(
                "{}: blocking chapter {chapter}, pending {}",
                status.series,
                pending.join(", ")
            ));
        }
        None => lines.push(format!("{}: every chapter is published", status.series)),
    }
    if !status.missing_roles.is_empty() {
        let roles: Vec<String> = status.missing_roles.iter().map(|r| r.to_string()).collect();
        lines.push(format!("unassigned: {}", roles.join(", ")));
    }
    match &status.rule {
        Some(rule) => lines.push(format!("publishes {rule}")),
        None => lines.push("no calendar rule".to_owned()),
    }
    lines.join("\n")
}

fn join_or_none<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let items: Vec<&str> = items.map(String::as_str).collect();
    if items.is_empty() {
        "(none)".to_owned()
    } else {
        items.join(", ")
    }
}
