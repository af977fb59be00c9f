//! Status aggregation across every tracked series.
//!
//! Paused and solo-managed series are dropped before any query runs. Sheets, exclusions and
//! calendar rules are re-read for every snapshot since the sources can change between ticks.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate};

use crate::app::source::TabularSource;
use crate::app::store::StateStore;
use crate::calendar::{CalendarRule, series_for_date};
use crate::deadline::{self, Overdue};
use crate::model::{Role, SeriesSheet, StageFlags};

pub const DEFAULT_RAW_LOOKAHEAD_DAYS: u64 = 10;
pub const DEFAULT_ASSIGNMENT_LOOKAHEAD_DAYS: u64 = 7;

/// Day offsets of the lookahead checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookahead {
    pub raw_days: u64,
    pub assignment_days: u64,
}

impl Default for Lookahead {
    fn default() -> Self {
        Self {
            raw_days: DEFAULT_RAW_LOOKAHEAD_DAYS,
            assignment_days: DEFAULT_ASSIGNMENT_LOOKAHEAD_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGap {
    pub series: String,
    pub chapter: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentGap {
    pub series: String,
    pub chapter: String,
    pub missing: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyChapter {
    pub series: String,
    pub chapter: String,
}

/// Gaps found for the series publishing on `date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedGaps<T> {
    pub date: NaiveDate,
    pub gaps: Vec<T>,
}

/// Blocking chapter of one series, as shown by the status command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesStatus {
    pub series: String,
    pub blocking: Option<(String, StageFlags)>,
    pub missing_roles: Vec<Role>,
    pub rule: Option<CalendarRule>,
}

/// Everything one scheduled batch reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub today: NaiveDate,
    pub raw_now: Vec<RawGap>,
    pub raw_lookahead: DatedGaps<RawGap>,
    pub assignments: DatedGaps<AssignmentGap>,
    pub ready: Option<ReadyChapter>,
    pub overdue: Vec<Overdue>,
}

/// Readable, non-excluded sheets plus the calendar rules, read at one instant.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub sheets: Vec<SeriesSheet>,
    pub rules: BTreeMap<String, CalendarRule>,
}

impl Snapshot {
    pub fn raw_pending_now(&self) -> Vec<RawGap> {
        self.sheets.iter().filter_map(raw_gap).collect()
    }

    pub fn raw_pending_on(&self, date: NaiveDate) -> Vec<RawGap> {
        self.publishing_on(date).filter_map(raw_gap).collect()
    }

    /// Series publishing on `date` whose blocking chapter lacks at least one assignee.
    pub fn assignment_gaps_on(&self, date: NaiveDate) -> Vec<AssignmentGap> {
        self.publishing_on(date)
            .filter_map(|sheet| {
                let chapter = sheet.next_blocking_chapter()?;
                let missing = sheet.assignment_gaps();
                (!missing.is_empty()).then(|| AssignmentGap {
                    series: sheet.name.clone(),
                    chapter: chapter.id.clone(),
                    missing,
                })
            })
            .collect()
    }

    /// First fully staged, unpublished chapter across series in source order.
    pub fn ready_to_publish(&self) -> Option<ReadyChapter> {
        self.sheets.iter().find_map(|sheet| {
            sheet.first_ready_chapter().map(|row| ReadyChapter {
                series: sheet.name.clone(),
                chapter: row.id.clone(),
            })
        })
    }

    fn publishing_on(&self, date: NaiveDate) -> impl Iterator<Item = &SeriesSheet> {
        let due = series_for_date(&self.rules, date);
        self.sheets
            .iter()
            .filter(move |sheet| due.contains(&sheet.name.as_str()))
    }
}

fn raw_gap(sheet: &SeriesSheet) -> Option<RawGap> {
    sheet.raw_gap().map(|chapter| RawGap {
        series: sheet.name.clone(),
        chapter: chapter.to_owned(),
    })
}

fn offset(today: NaiveDate, days: u64) -> NaiveDate {
    today.checked_add_days(Days::new(days)).unwrap_or(today)
}

/// Combines the tabular source with the local stores.
#[derive(Clone)]
pub struct StatusAggregator {
    source: Arc<dyn TabularSource>,
    store: StateStore,
}

impl StatusAggregator {
    pub fn new(source: Arc<dyn TabularSource>, store: StateStore) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Reads every non-excluded series. Unreachable or unreadable sheets are logged and
    /// left out; only store failures are returned.
    pub async fn snapshot(&self) -> anyhow::Result<Snapshot> {
        let exclusions = self.store.exclusions().await?;
        let rules = self.store.calendar().await?;

        let names = match self.source.list_series().await {
            Ok(names) => names,
            Err(err) => {
                tracing::warn!(kind = "source_unavailable", ?err, "cannot list series");
                return Ok(Snapshot {
                    sheets: Vec::new(),
                    rules,
                });
            }
        };

        let mut sheets = Vec::new();
        for name in names {
            if exclusions.is_excluded(&name) {
                tracing::debug!(series = %name, "excluded");
                continue;
            }
            if let Some(sheet) = self.read_sheet(&name).await {
                sheets.push(sheet);
            }
        }
        Ok(Snapshot { sheets, rules })
    }

    async fn read_sheet(&self, name: &str) -> Option<SeriesSheet> {
        let grid = match self.source.read_series(name).await {
            Ok(Some(grid)) => grid,
            Ok(None) => {
                tracing::warn!(kind = "source_unavailable", series = %name, "sheet missing");
                return None;
            }
            Err(err) => {
                tracing::warn!(kind = "source_unavailable", series = %name, ?err, "cannot read sheet");
                return None;
            }
        };
        match SeriesSheet::parse(name, &grid) {
            Ok(sheet) => {
                if !sheet.is_publication_monotonic() {
                    tracing::warn!(
                        series = %name,
                        "a chapter after the blocking chapter is already published"
                    );
                }
                Some(sheet)
            }
            Err(err) => {
                tracing::warn!(kind = "malformed_row", series = %name, %err, "sheet unreadable");
                None
            }
        }
    }

    pub async fn raw_pending_now(&self) -> anyhow::Result<Vec<RawGap>> {
        Ok(self.snapshot().await?.raw_pending_now())
    }

    pub async fn raw_pending_lookahead(
        &self,
        today: NaiveDate,
        days: u64,
    ) -> anyhow::Result<DatedGaps<RawGap>> {
        let date = offset(today, days);
        let gaps = self.snapshot().await?.raw_pending_on(date);
        Ok(DatedGaps { date, gaps })
    }

    pub async fn assignment_gaps_lookahead(
        &self,
        today: NaiveDate,
        days: u64,
    ) -> anyhow::Result<DatedGaps<AssignmentGap>> {
        let date = offset(today, days);
        let gaps = self.snapshot().await?.assignment_gaps_on(date);
        Ok(DatedGaps { date, gaps })
    }

    pub async fn ready_to_publish(&self) -> anyhow::Result<Option<ReadyChapter>> {
        Ok(self.snapshot().await?.ready_to_publish())
    }

    pub async fn overdue(&self, today: NaiveDate) -> anyhow::Result<Vec<Overdue>> {
        Ok(deadline::overdue(&self.store.deadlines().await?, today))
    }

    /// Series (non-excluded) whose rule matches `date`.
    pub async fn publishing_on(&self, date: NaiveDate) -> anyhow::Result<Vec<String>> {
        let exclusions = self.store.exclusions().await?;
        let rules = self.store.calendar().await?;
        Ok(series_for_date(&rules, date)
            .into_iter()
            .filter(|series| !exclusions.is_excluded(series))
            .map(str::to_owned)
            .collect())
    }

    /// Status of one series, ignoring exclusions. `Ok(None)` when the sheet cannot be read.
    pub async fn series_status(&self, series: &str) -> anyhow::Result<Option<SeriesStatus>> {
        let rule = self.store.calendar().await?.remove(series);
        let Some(sheet) = self.read_sheet(series).await else {
            return Ok(None);
        };
        Ok(Some(SeriesStatus {
            series: sheet.name.clone(),
            blocking: sheet
                .next_blocking_chapter()
                .map(|row| (row.id.clone(), row.flags)),
            missing_roles: sheet.assignment_gaps(),
            rule,
        }))
    }

    /// All batch results from a single snapshot.
    pub async fn report(
        &self,
        today: NaiveDate,
        lookahead: Lookahead,
    ) -> anyhow::Result<StatusReport> {
        let snapshot = self.snapshot().await?;
        let raw_date = offset(today, lookahead.raw_days);
        let assignment_date = offset(today, lookahead.assignment_days);

        Ok(StatusReport {
            today,
            raw_now: snapshot.raw_pending_now(),
            raw_lookahead: DatedGaps {
                date: raw_date,
                gaps: snapshot.raw_pending_on(raw_date),
            },
            assignments: DatedGaps {
                date: assignment_date,
                gaps: snapshot.assignment_gaps_on(assignment_date),
            },
            ready: snapshot.ready_to_publish(),
            overdue: self.overdue(today).await?,
        })
    }
}
