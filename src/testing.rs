//! Fakes shared by unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::app::notifier::Notifier;
use crate::app::source::{Grid, TabularSource};
use crate::error::DeliveryError;
use crate::scheduler::Clock;

pub const HEADER: [&str; 9] = [
    "Chapter",
    "RAW uploaded",
    "Translation done",
    "Clean done",
    "Type done",
    "Published",
    "Translator",
    "Cleaner",
    "Typer",
];

/// One chapter row; `flags` holds five marks (RAW, translation, clean, type, published),
/// `✅` meaning done.
#[derive(Debug, Clone)]
pub struct ChapterSpec {
    cells: Vec<String>,
}

pub fn chapter(id: &str, flags: &str) -> ChapterSpec {
    let mut cells = vec![id.to_owned()];
    cells.extend(
        flags
            .chars()
            .map(|c| if c == '✅' { "✅".to_owned() } else { String::new() }),
    );
    ChapterSpec { cells }
}

impl ChapterSpec {
    pub fn assigned(mut self, translator: &str, cleaner: &str, typer: &str) -> Self {
        self.cells.truncate(6);
        self.cells.resize(6, String::new());
        self.cells
            .extend([translator, cleaner, typer].map(str::to_owned));
        self
    }
}

#[derive(Debug, Default)]
pub struct MemorySource {
    order: Vec<String>,
    grids: BTreeMap<String, Grid>,
}

impl MemorySource {
    pub fn with_series(self, name: &str, chapters: &[ChapterSpec]) -> Self {
        let mut grid = vec![vec![name.to_owned()], HEADER.map(str::to_owned).to_vec()];
        grid.extend(chapters.iter().map(|c| c.cells.clone()));
        self.with_grid(name, grid)
    }

    pub fn with_grid(mut self, name: &str, grid: Grid) -> Self {
        self.order.push(name.to_owned());
        self.grids.insert(name.to_owned(), grid);
        self
    }

    /// Lists a sheet that cannot be read.
    pub fn listing_extra(mut self, name: &str) -> Self {
        self.order.push(name.to_owned());
        self
    }
}

#[async_trait]
impl TabularSource for MemorySource {
    async fn list_series(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.order.clone())
    }

    async fn read_series(&self, name: &str) -> anyhow::Result<Option<Grid>> {
        Ok(self.grids.get(name).cloned())
    }
}

/// Records delivered messages; queued failures are returned first, one per call.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<DeliveryError>>,
}

impl RecordingNotifier {
    pub fn failing_with(errors: impl IntoIterator<Item = DeliveryError>) -> Self {
        Self {
            sent: Mutex::default(),
            failures: Mutex::new(errors.into_iter().collect()),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.sent.lock().unwrap().push(text.to_owned());
        Ok(())
    }
}

/// Holds every send until `release` is notified, then records the message.
#[derive(Debug, Default)]
pub struct BlockingNotifier {
    pub release: Notify,
    sent: Mutex<Vec<String>>,
}

impl BlockingNotifier {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for BlockingNotifier {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        self.release.notified().await;
        self.sent.lock().unwrap().push(text.to_owned());
        Ok(())
    }
}

#[derive(Debug)]
pub struct FixedClock(pub Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}
