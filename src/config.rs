use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Weekday;

use crate::app::notifier::DiscordConfig;
use crate::app::source::CsvDirSource;
use crate::app::store::StateStore;
use crate::calendar::parse_weekday;
use crate::scheduler::{
    DEFAULT_BACKOFF_INITIAL, DEFAULT_BACKOFF_MAX, DEFAULT_TRIGGER_HOURS, DEFAULT_UTC_OFFSET_HOURS,
    DEFAULT_WEEKLY_HOUR, FatalPolicy, RetryPolicy, TriggerGate,
};
use crate::status::{
    DEFAULT_ASSIGNMENT_LOOKAHEAD_DAYS, DEFAULT_RAW_LOOKAHEAD_DAYS, Lookahead, StatusAggregator,
};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_SHEETS_DIR: &str = "sheets";
pub const DEFAULT_IGNORED_SHEETS: [&str; 2] = ["CARPETAS", "DIA DE SUBIDA"];
pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Runtime settings, read from `STAGEWATCH_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub sheets_dir: PathBuf,
    pub ignored_sheets: Vec<String>,
    pub gate: TriggerGate,
    pub lookahead: Lookahead,
    pub retry: RetryPolicy,
    pub on_fatal: FatalPolicy,
    pub discord: Option<DiscordConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset and blank values take their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let ignored_sheets = match var("STAGEWATCH_IGNORED_SHEETS") {
            Some(raw) => split_list(&raw),
            None => DEFAULT_IGNORED_SHEETS.map(str::to_owned).to_vec(),
        };

        let utc_offset_hours: i32 =
            parse_or("STAGEWATCH_UTC_OFFSET_HOURS", var, DEFAULT_UTC_OFFSET_HOURS)?;
        let trigger_hours = match var("STAGEWATCH_TRIGGER_HOURS") {
            Some(raw) => split_list(&raw)
                .iter()
                .map(|h| h.parse::<u32>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("invalid STAGEWATCH_TRIGGER_HOURS={raw:?}"))?,
            None => DEFAULT_TRIGGER_HOURS.to_vec(),
        };
        let weekly_hour: u32 = parse_or("STAGEWATCH_WEEKLY_HOUR", var, DEFAULT_WEEKLY_HOUR)?;
        let weekly_day = match var("STAGEWATCH_WEEKLY_DAY") {
            Some(raw) => parse_weekday(&raw)
                .with_context(|| format!("invalid STAGEWATCH_WEEKLY_DAY={raw:?}"))?,
            None => Weekday::Sun,
        };
        let gate = TriggerGate::new(utc_offset_hours, trigger_hours, weekly_day, weekly_hour)
            .context("invalid trigger schedule")?;

        let lookahead = Lookahead {
            raw_days: parse_or(
                "STAGEWATCH_RAW_LOOKAHEAD_DAYS",
                var,
                DEFAULT_RAW_LOOKAHEAD_DAYS,
            )?,
            assignment_days: parse_or(
                "STAGEWATCH_ASSIGNMENT_LOOKAHEAD_DAYS",
                var,
                DEFAULT_ASSIGNMENT_LOOKAHEAD_DAYS,
            )?,
        };

        let retry = RetryPolicy {
            initial: Duration::from_secs(parse_or(
                "STAGEWATCH_BACKOFF_INITIAL_SECS",
                var,
                DEFAULT_BACKOFF_INITIAL.as_secs(),
            )?),
            max: Duration::from_secs(parse_or(
                "STAGEWATCH_BACKOFF_MAX_SECS",
                var,
                DEFAULT_BACKOFF_MAX.as_secs(),
            )?),
        };
        if retry.initial.is_zero() || retry.initial > retry.max {
            anyhow::bail!(
                "backoff must satisfy 0 < initial ({}s) <= max ({}s)",
                retry.initial.as_secs(),
                retry.max.as_secs()
            );
        }

        let on_fatal = match var("STAGEWATCH_ON_FATAL") {
            Some(raw) => FatalPolicy::parse(&raw).with_context(|| {
                format!("invalid STAGEWATCH_ON_FATAL={raw:?}. expected one of: retry, exit")
            })?,
            None => FatalPolicy::default(),
        };

        let discord = match (
            var("STAGEWATCH_DISCORD_TOKEN"),
            var("STAGEWATCH_DISCORD_CHANNEL_ID"),
        ) {
            (Some(bot_token), Some(channel_id)) => Some(DiscordConfig {
                api_base: var("STAGEWATCH_DISCORD_API_BASE")
                    .unwrap_or_else(|| DEFAULT_DISCORD_API_BASE.to_owned()),
                bot_token,
                channel_id,
            }),
            (None, None) => None,
            (Some(_), None) => anyhow::bail!(
                "STAGEWATCH_DISCORD_CHANNEL_ID is required when STAGEWATCH_DISCORD_TOKEN is set"
            ),
            (None, Some(_)) => anyhow::bail!(
                "STAGEWATCH_DISCORD_TOKEN is required when STAGEWATCH_DISCORD_CHANNEL_ID is set"
            ),
        };

        Ok(Self {
            data_dir: var("STAGEWATCH_DATA_DIR")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_owned())
                .into(),
            sheets_dir: var("STAGEWATCH_SHEETS_DIR")
                .unwrap_or_else(|| DEFAULT_SHEETS_DIR.to_owned())
                .into(),
            ignored_sheets,
            gate,
            lookahead,
            retry,
            on_fatal,
            discord,
        })
    }

    /// CSV sheets dir plus the local stores, as configured.
    pub fn aggregator(&self) -> StatusAggregator {
        let source = CsvDirSource::new(&self.sheets_dir).with_ignored(self.ignored_sheets.clone());
        StatusAggregator::new(Arc::new(source), StateStore::local(&self.data_dir))
    }

    pub fn require_discord(&self) -> anyhow::Result<&DiscordConfig> {
        self.discord.as_ref().context(
            "STAGEWATCH_DISCORD_TOKEN and STAGEWATCH_DISCORD_CHANNEL_ID are required to deliver messages",
        )
    }
}

fn parse_or<T>(key: &str, var: impl Fn(&str) -> Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid {key}={raw:?}")),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
