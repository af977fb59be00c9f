use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;

use crate::calendar::CalendarRule;
use crate::deadline::{Deadline, DeadlineBook};

/// One persisted key-based document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    Paused,
    Solo,
    Calendar,
    Deadlines,
    Aliases,
}

impl Document {
    pub fn file_name(self) -> &'static str {
        match self {
            Document::Paused => "paused.json",
            Document::Solo => "solo.json",
            Document::Calendar => "calendar.json",
            Document::Deadlines => "deadlines.json",
            Document::Aliases => "aliases.json",
        }
    }
}

/// Whole-document persistence. A missing document reads as `None`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, doc: Document) -> anyhow::Result<Option<serde_json::Value>>;
    async fn write(&self, doc: Document, value: &serde_json::Value) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct LocalFsDocumentStore {
    base_dir: PathBuf,
}

impl LocalFsDocumentStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn path(&self, doc: Document) -> PathBuf {
        self.base_dir.join(doc.file_name())
    }
}

#[async_trait]
impl DocumentStore for LocalFsDocumentStore {
    async fn read(&self, doc: Document) -> anyhow::Result<Option<serde_json::Value>> {
        let path = self.path(doc);
        read_json(&path)
            .await
            .with_context(|| format!("read: {}", path.display()))
    }

    async fn write(&self, doc: Document, value: &serde_json::Value) -> anyhow::Result<()> {
        let path = self.path(doc);
        write_json_atomic(&path, value)
            .await
            .with_context(|| format!("write: {}", path.display()))
    }
}

/// Process-local documents that are never persisted.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<Document, serde_json::Value>>,
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read(&self, doc: Document) -> anyhow::Result<Option<serde_json::Value>> {
        let docs = self
            .docs
            .lock()
            .map_err(|_| anyhow::anyhow!("memory document store is poisoned"))?;
        Ok(docs.get(&doc).cloned())
    }

    async fn write(&self, doc: Document, value: &serde_json::Value) -> anyhow::Result<()> {
        let mut docs = self
            .docs
            .lock()
            .map_err(|_| anyhow::anyhow!("memory document store is poisoned"))?;
        docs.insert(doc, value.clone());
        Ok(())
    }
}

/// Paused and solo-managed series. Both are left out of every status query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    pub paused: BTreeSet<String>,
    pub solo: BTreeSet<String>,
}

impl Exclusions {
    pub fn is_excluded(&self, series: &str) -> bool {
        self.paused.contains(series) || self.solo.contains(series)
    }
}

/// Single lookup, no chaining; unknown names resolve to themselves.
pub fn resolve_alias(aliases: &BTreeMap<String, String>, name: &str) -> String {
    let name = name.trim();
    aliases
        .get(name)
        .cloned()
        .unwrap_or_else(|| name.to_owned())
}

/// Typed access to the exclusion, calendar, deadline and alias documents.
///
/// Every mutation reads the whole document, changes it and writes it back. Concurrent
/// writers can lose updates.
#[derive(Clone)]
pub struct StateStore {
    docs: Arc<dyn DocumentStore>,
}

impl StateStore {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    pub fn local(base_dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(LocalFsDocumentStore::new(base_dir)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDocumentStore::default()))
    }

    async fn load<T: DeserializeOwned + Default>(&self, doc: Document) -> anyhow::Result<T> {
        match self.docs.read(doc).await? {
            Some(value) => serde_json::from_value(value)
                .with_context(|| format!("parse {}", doc.file_name())),
            None => Ok(T::default()),
        }
    }

    async fn save<T: Serialize>(&self, doc: Document, value: &T) -> anyhow::Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("serialize {}", doc.file_name()))?;
        self.docs.write(doc, &value).await
    }

    async fn toggle(&self, doc: Document, series: &str, member: bool) -> anyhow::Result<bool> {
        let mut set: BTreeSet<String> = self.load(doc).await?;
        let changed = if member {
            set.insert(series.to_owned())
        } else {
            set.remove(series)
        };
        if changed {
            self.save(doc, &set).await?;
        }
        Ok(changed)
    }

    pub async fn exclusions(&self) -> anyhow::Result<Exclusions> {
        Ok(Exclusions {
            paused: self.load(Document::Paused).await?,
            solo: self.load(Document::Solo).await?,
        })
    }

    /// Returns `false` when the series already had the requested state.
    pub async fn set_paused(&self, series: &str, paused: bool) -> anyhow::Result<bool> {
        self.toggle(Document::Paused, series, paused).await
    }

    pub async fn set_solo(&self, series: &str, solo: bool) -> anyhow::Result<bool> {
        self.toggle(Document::Solo, series, solo).await
    }

    pub async fn calendar(&self) -> anyhow::Result<BTreeMap<String, CalendarRule>> {
        self.load(Document::Calendar).await
    }

    /// Replaces the series' rule and returns the previous one.
    pub async fn set_rule(
        &self,
        series: &str,
        rule: CalendarRule,
    ) -> anyhow::Result<Option<CalendarRule>> {
        let mut rules = self.calendar().await?;
        let previous = rules.insert(series.to_owned(), rule);
        self.save(Document::Calendar, &rules).await?;
        Ok(previous)
    }

    pub async fn remove_rule(&self, series: &str) -> anyhow::Result<Option<CalendarRule>> {
        let mut rules = self.calendar().await?;
        let previous = rules.remove(series);
        if previous.is_some() {
            self.save(Document::Calendar, &rules).await?;
        }
        Ok(previous)
    }

    pub async fn deadlines(&self) -> anyhow::Result<DeadlineBook> {
        self.load(Document::Deadlines).await
    }

    pub async fn set_deadline(
        &self,
        series: &str,
        chapter: &str,
        deadline: Deadline,
    ) -> anyhow::Result<Option<Deadline>> {
        let mut book = self.deadlines().await?;
        let previous = book
            .entry(series.to_owned())
            .or_default()
            .insert(chapter.to_owned(), deadline);
        self.save(Document::Deadlines, &book).await?;
        Ok(previous)
    }

    pub async fn remove_deadline(
        &self,
        series: &str,
        chapter: &str,
    ) -> anyhow::Result<Option<Deadline>> {
        let mut book = self.deadlines().await?;
        let Some(chapters) = book.get_mut(series) else {
            return Ok(None);
        };
        let previous = chapters.remove(chapter);
        if chapters.is_empty() {
            book.remove(series);
        }
        if previous.is_some() {
            self.save(Document::Deadlines, &book).await?;
        }
        Ok(previous)
    }

    pub async fn aliases(&self) -> anyhow::Result<BTreeMap<String, String>> {
        self.load(Document::Aliases).await
    }

    pub async fn set_alias(&self, short: &str, canonical: &str) -> anyhow::Result<Option<String>> {
        let mut aliases = self.aliases().await?;
        let previous = aliases.insert(short.to_owned(), canonical.to_owned());
        self.save(Document::Aliases, &aliases).await?;
        Ok(previous)
    }

    pub async fn remove_alias(&self, short: &str) -> anyhow::Result<Option<String>> {
        let mut aliases = self.aliases().await?;
        let previous = aliases.remove(short);
        if previous.is_some() {
            self.save(Document::Aliases, &aliases).await?;
        }
        Ok(previous)
    }

    pub async fn resolve(&self, name: &str) -> anyhow::Result<String> {
        Ok(resolve_alias(&self.aliases().await?, name))
    }
}

async fn read_json(path: &Path) -> anyhow::Result<Option<serde_json::Value>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

async fn write_json_atomic(path: &Path, value: &serde_json::Value) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
